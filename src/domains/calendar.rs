//! Calendar scheduling: is this an event, what are its details, confirm it

use crate::chain::ChainDomain;
use crate::dispatch::DispatchOutcome;
use crate::models::Message;
use crate::schema::{FieldType, StructuredOutput, StructuredSchema};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDetails {
    pub name: String,
    /// ISO 8601 date and time
    pub date: String,
    pub duration_minutes: i64,
    pub participants: Vec<String>,
}

impl StructuredOutput for EventDetails {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("EventDetails")
            .required("name", FieldType::String, "Name of the event")
            .required(
                "date",
                FieldType::String,
                "Date and time of the event, use ISO 8601 to format this value",
            )
            .required("duration_minutes", FieldType::Integer, "Duration in minutes")
            .required("participants", FieldType::StringList, "List of participants")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventConfirmation {
    pub confirmation_message: String,
    pub calendar_link: Option<String>,
}

impl StructuredOutput for EventConfirmation {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("EventConfirmation")
            .required(
                "confirmation_message",
                FieldType::String,
                "Natural language confirmation message",
            )
            .optional(
                "calendar_link",
                FieldType::String,
                "Generated calendar link if applicable",
            )
    }
}

/// Relative dates ("next Tuesday") are resolved against a reference time,
/// the local clock unless one is pinned.
pub struct CalendarDomain {
    reference_time: Option<NaiveDateTime>,
    signature: String,
}

impl CalendarDomain {
    pub fn new() -> Self {
        Self {
            reference_time: None,
            signature: "the scheduling assistant".to_string(),
        }
    }

    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    /// Name the confirmation is signed with
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    fn date_context(&self) -> String {
        let now = self
            .reference_time
            .unwrap_or_else(|| Local::now().naive_local());
        format!("Today is {}.", now.format("%A, %B %d, %Y %H:%M:%S"))
    }
}

impl Default for CalendarDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainDomain for CalendarDomain {
    type Detail = EventDetails;
    type Final = EventConfirmation;

    fn name(&self) -> &str {
        "calendar"
    }

    fn extraction_prompt(&self) -> String {
        format!(
            "{} Analyze if the text describes a calendar event and provide a confidence score. \
             Store the user input as the description if it is a valid calendar event.",
            self.date_context()
        )
    }

    fn detail_prompt(&self) -> String {
        format!(
            "{} Extract detailed event information from user input. When dates reference \
             'next Tuesday' or similar relative dates, use this current date as reference. \
             Include the time of the event.",
            self.date_context()
        )
    }

    fn confirmation_messages(
        &self,
        detail: &EventDetails,
        _dispatch: Option<&DispatchOutcome>,
    ) -> Vec<Message> {
        vec![
            Message::system(format!(
                "Generate a confirmation message for the event and sign off with your name: {}",
                self.signature
            )),
            Message::user(serde_json::to_string(detail).unwrap_or_default()),
        ]
    }
}
