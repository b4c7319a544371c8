//! Request and response types for the review and polish flows.
//!
//! The option enums mirror the choices offered by the review form. Their
//! serde names are the human-readable labels so the JSON API accepts exactly
//! what the form submits, and `Display` renders the same label into prompts.

use serde::de::value::StringDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => $label:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            /// Every variant, in form order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// The label used both on the wire and inside prompts.
            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled_enum! {
    /// Research field of the paper under review.
    Field {
        ComputerScience => "Computer Science",
        Biology => "Biology",
        Physics => "Physics",
        Chemistry => "Chemistry",
        Mathematics => "Mathematics",
        Engineering => "Engineering",
        EnvironmentalScience => "Environmental Science",
        Psychology => "Psychology",
    }
}

labelled_enum! {
    /// Which part of the paper the review should concentrate on.
    ReviewFocus {
        All => "All",
        Methodology => "Methodology",
        Results => "Results",
        Discussion => "Discussion",
        LiteratureReview => "Literature Review",
        TheoreticalFramework => "Theoretical Framework",
        DataAnalysis => "Data Analysis",
        ExperimentalDesign => "Experimental Design",
        Conclusions => "Conclusions",
    }
}

labelled_enum! {
    PaperType {
        OriginalResearch => "Original Research",
        Review => "Review",
    }
}

labelled_enum! {
    /// Whether a detailed review was requested.
    DetailLevel {
        Detailed => "Yes",
        Brief => "No",
    }
}

labelled_enum! {
    /// Output language for reviews and target language for polishing.
    Language {
        English => "English",
        Chinese => "Chinese",
        Japanese => "Japanese",
        German => "German",
        French => "French",
    }
}

impl Default for ReviewFocus {
    fn default() -> Self {
        ReviewFocus::All
    }
}

impl Default for PaperType {
    fn default() -> Self {
        PaperType::OriginalResearch
    }
}

impl Default for DetailLevel {
    fn default() -> Self {
        DetailLevel::Brief
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

fn default_level() -> u8 {
    50
}

/// Reads any JSON number and clamps it into `0..=100`.
fn clamped_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let level = f64::deserialize(deserializer)?;
    Ok(level.clamp(0.0, 100.0).round() as u8)
}

/// An untouched form select posts `""`; read it as the default choice.
fn blank_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let raw = String::deserialize(deserializer)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    T::deserialize(StringDeserializer::<D::Error>::new(raw))
}

/// The user-selected review options, i.e. everything but the paper text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOptions {
    pub field: Field,
    #[serde(default, alias = "reviewFocus", deserialize_with = "blank_as_default")]
    pub focus: ReviewFocus,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub paper_type: PaperType,
    #[serde(default, alias = "detailedReview", deserialize_with = "blank_as_default")]
    pub detail_level: DetailLevel,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub output_language: Language,
    /// 0 = lenient, 100 = very strict. Out-of-range numbers are clamped.
    #[serde(
        default = "default_level",
        alias = "strictnessLevel",
        deserialize_with = "clamped_level"
    )]
    pub strictness: u8,
    #[serde(default, alias = "additionalRequirements")]
    pub extra_requirements: String,
}

impl ReviewOptions {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            focus: ReviewFocus::default(),
            paper_type: PaperType::default(),
            detail_level: DetailLevel::default(),
            output_language: Language::default(),
            strictness: default_level(),
            extra_requirements: String::new(),
        }
    }

    pub fn strictness(&self) -> u8 {
        self.strictness.min(100)
    }
}

/// A review submission: the extracted paper text plus the chosen options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[serde(alias = "pdfText")]
    pub document_text: String,
    #[serde(flatten)]
    pub options: ReviewOptions,
}

impl ReviewRequest {
    pub fn new(document_text: impl Into<String>, options: ReviewOptions) -> Self {
        Self {
            document_text: document_text.into(),
            options,
        }
    }
}

/// A polish submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolishRequest {
    pub text: String,
    #[serde(default, rename = "language", deserialize_with = "blank_as_default")]
    pub target_language: Language,
    /// 0 = light touch, 100 = full rewrite. Out-of-range numbers are clamped.
    #[serde(
        default = "default_level",
        alias = "polishLevel",
        deserialize_with = "clamped_level"
    )]
    pub intensity: u8,
}

impl PolishRequest {
    pub fn new(text: impl Into<String>, target_language: Language, intensity: u8) -> Self {
        Self {
            text: text.into(),
            target_language,
            intensity,
        }
    }

    pub fn intensity(&self) -> u8 {
        self.intensity.min(100)
    }
}

/// Normalised completion text returned by the model gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
}
