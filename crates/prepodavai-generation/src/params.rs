// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type request parameter schemas.
//!
//! Each generation type has a params struct; [`parse`] deserializes the raw
//! request body into it and checks required fields and numeric bounds. The
//! normalized form (defaults filled in) is what gets persisted.

use std::ops::RangeInclusive;
use std::str::FromStr;

use prepodavai_core::{GenerationType, PrepodavaiError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

trait Schema: DeserializeOwned {
    fn check(&self) -> Result<(), PrepodavaiError>;
}

fn required(field: &str, value: &str) -> Result<(), PrepodavaiError> {
    if value.trim().is_empty() {
        return Err(PrepodavaiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn bounded(field: &str, value: u32, range: RangeInclusive<u32>) -> Result<(), PrepodavaiError> {
    if !range.contains(&value) {
        return Err(PrepodavaiError::Validation(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

fn url(field: &str, value: &str) -> Result<(), PrepodavaiError> {
    required(field, value)?;
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(PrepodavaiError::Validation(format!(
            "{field} must be an http(s) URL"
        )));
    }
    Ok(())
}

fn default_questions() -> u32 {
    10
}

fn default_answer_options() -> u32 {
    4
}

fn default_word_count() -> u32 {
    20
}

fn default_duration() -> u32 {
    45
}

fn default_photo_count() -> u32 {
    4
}

fn default_slide_count() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl Schema for TextGenerationParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("prompt", &self.prompt)?;
        if let Some(max) = self.max_length {
            bounded("maxLength", max, 50..=20_000)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetParams {
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default = "default_questions")]
    pub question_count: u32,
}

impl Schema for WorksheetParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("subject", &self.subject)?;
        required("topic", &self.topic)?;
        bounded("questionCount", self.question_count, 1..=50)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizParams {
    pub subject: String,
    pub topic: String,
    #[serde(default = "default_questions")]
    pub question_count: u32,
    #[serde(default = "default_answer_options")]
    pub answer_options: u32,
}

impl Schema for QuizParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("subject", &self.subject)?;
        required("topic", &self.topic)?;
        bounded("questionCount", self.question_count, 1..=50)?;
        bounded("answerOptions", self.answer_options, 2..=6)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyParams {
    pub topic: String,
    pub language: String,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
}

impl Schema for VocabularyParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("topic", &self.topic)?;
        required("language", &self.language)?;
        bounded("wordCount", self.word_count, 1..=100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlanParams {
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
}

impl Schema for LessonPlanParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("subject", &self.subject)?;
        required("topic", &self.topic)?;
        bounded("durationMinutes", self.duration_minutes, 10..=240)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackParams {
    pub student_work: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
}

impl Schema for FeedbackParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("studentWork", &self.student_work)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAdaptationParams {
    pub text: String,
    pub target_level: String,
}

impl Schema for ContentAdaptationParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("text", &self.text)?;
        required("targetLevel", &self.target_level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageParams {
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Schema for MessageParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("purpose", &self.purpose)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Schema for ImageGenerationParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("prompt", &self.prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotosessionParams {
    pub photo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default = "default_photo_count")]
    pub count: u32,
}

impl Schema for PhotosessionParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        url("photoUrl", &self.photo_url)?;
        bounded("count", self.count, 1..=10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationParams {
    pub topic: String,
    #[serde(default = "default_slide_count")]
    pub slide_count: u32,
}

impl Schema for PresentationParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        required("topic", &self.topic)?;
        bounded("slideCount", self.slide_count, 3..=30)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionParams {
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Schema for TranscriptionParams {
    fn check(&self) -> Result<(), PrepodavaiError> {
        url("audioUrl", &self.audio_url)
    }
}

/// Validated parameters, one variant per generation type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerationParams {
    TextGeneration(TextGenerationParams),
    Worksheet(WorksheetParams),
    Quiz(QuizParams),
    Vocabulary(VocabularyParams),
    LessonPlan(LessonPlanParams),
    Feedback(FeedbackParams),
    ContentAdaptation(ContentAdaptationParams),
    Message(MessageParams),
    ImageGeneration(ImageGenerationParams),
    Photosession(PhotosessionParams),
    Presentation(PresentationParams),
    Transcription(TranscriptionParams),
}

impl GenerationParams {
    pub fn generation_type(&self) -> GenerationType {
        match self {
            GenerationParams::TextGeneration(_) => GenerationType::TextGeneration,
            GenerationParams::Worksheet(_) => GenerationType::Worksheet,
            GenerationParams::Quiz(_) => GenerationType::Quiz,
            GenerationParams::Vocabulary(_) => GenerationType::Vocabulary,
            GenerationParams::LessonPlan(_) => GenerationType::LessonPlan,
            GenerationParams::Feedback(_) => GenerationType::Feedback,
            GenerationParams::ContentAdaptation(_) => GenerationType::ContentAdaptation,
            GenerationParams::Message(_) => GenerationType::Message,
            GenerationParams::ImageGeneration(_) => GenerationType::ImageGeneration,
            GenerationParams::Photosession(_) => GenerationType::Photosession,
            GenerationParams::Presentation(_) => GenerationType::Presentation,
            GenerationParams::Transcription(_) => GenerationType::Transcription,
        }
    }

    /// Normalized JSON form, as persisted in `input_params`.
    pub fn to_value(&self) -> Result<serde_json::Value, PrepodavaiError> {
        serde_json::to_value(self).map_err(|e| PrepodavaiError::Internal(e.to_string()))
    }
}

fn decode<T: Schema>(raw: serde_json::Value) -> Result<T, PrepodavaiError> {
    if !raw.is_object() {
        return Err(PrepodavaiError::Validation(
            "request body must be a JSON object".into(),
        ));
    }
    let params: T =
        serde_json::from_value(raw).map_err(|e| PrepodavaiError::Validation(e.to_string()))?;
    params.check()?;
    Ok(params)
}

/// Deserialize and validate `raw` against the schema of `generation_type`.
pub fn parse(
    generation_type: GenerationType,
    raw: serde_json::Value,
) -> Result<GenerationParams, PrepodavaiError> {
    use GenerationType as T;
    Ok(match generation_type {
        T::TextGeneration => GenerationParams::TextGeneration(decode(raw)?),
        T::Worksheet => GenerationParams::Worksheet(decode(raw)?),
        T::Quiz => GenerationParams::Quiz(decode(raw)?),
        T::Vocabulary => GenerationParams::Vocabulary(decode(raw)?),
        T::LessonPlan => GenerationParams::LessonPlan(decode(raw)?),
        T::Feedback => GenerationParams::Feedback(decode(raw)?),
        T::ContentAdaptation => GenerationParams::ContentAdaptation(decode(raw)?),
        T::Message => GenerationParams::Message(decode(raw)?),
        T::ImageGeneration => GenerationParams::ImageGeneration(decode(raw)?),
        T::Photosession => GenerationParams::Photosession(decode(raw)?),
        T::Presentation => GenerationParams::Presentation(decode(raw)?),
        T::Transcription => GenerationParams::Transcription(decode(raw)?),
    })
}

/// Resolve a type name from a route segment.
pub fn resolve_type(name: &str) -> Result<GenerationType, PrepodavaiError> {
    GenerationType::from_str(name)
        .map_err(|_| PrepodavaiError::UnknownGenerationType(name.to_string()))
}
