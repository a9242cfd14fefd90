use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ReferenceCampaign;

pub const MANDATORY_FIELDS: [&str; 5] = [
    "campaignName",
    "keyMessage",
    "creativeStrategy",
    "executionPlan",
    "expectedOutcomes",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("campaign payload is not a JSON object")]
    NotAnObject,
    #[error("campaign payload is missing mandatory field '{0}'")]
    MissingField(&'static str),
    #[error("campaign field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("campaign field '{0}' is empty")]
    EmptyField(&'static str),
}

/// A campaign concept produced by the completion model.
///
/// Values are never edited in place once validated; passes and refinements
/// build a new value and carry `reference_campaigns` and `storytelling` over.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCampaign {
    pub campaign_name: String,
    pub key_message: String,
    pub creative_strategy: Vec<String>,
    pub execution_plan: Vec<String>,
    #[serde(default)]
    pub viral_hook: String,
    #[serde(default)]
    pub viral_element: String,
    #[serde(default)]
    pub consumer_interaction: String,
    pub expected_outcomes: Vec<String>,
    #[serde(default)]
    pub call_to_action: String,
    #[serde(default)]
    pub creative_insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_campaigns: Vec<ReferenceCampaign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storytelling: Option<Map<String, Value>>,
}

impl GeneratedCampaign {
    /// Checks a model-produced JSON value field by field and builds a campaign.
    ///
    /// `referenceCampaigns` and `storytelling` in model output are ignored; the
    /// pipeline owns those fields.
    pub fn from_model_value(value: &Value) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;
        for field in MANDATORY_FIELDS {
            if obj.get(field).map(Value::is_null).unwrap_or(true) {
                return Err(SchemaError::MissingField(field));
            }
        }

        let campaign = Self {
            campaign_name: required_text(obj, "campaignName")?,
            key_message: required_text(obj, "keyMessage")?,
            creative_strategy: text_list(obj, "creativeStrategy")?,
            execution_plan: text_list(obj, "executionPlan")?,
            viral_hook: optional_text(obj, "viralHook")?,
            viral_element: optional_text(obj, "viralElement")?,
            consumer_interaction: optional_text(obj, "consumerInteraction")?,
            expected_outcomes: text_list(obj, "expectedOutcomes")?,
            call_to_action: optional_text(obj, "callToAction")?,
            creative_insights: text_list(obj, "creativeInsights")?,
            reference_campaigns: Vec::new(),
            storytelling: None,
        };
        campaign.validate()?;
        Ok(campaign)
    }

    /// Store-side guard: a campaign must carry a name and a key message.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.campaign_name.trim().is_empty() {
            return Err(SchemaError::EmptyField("campaignName"));
        }
        if self.key_message.trim().is_empty() {
            return Err(SchemaError::EmptyField("keyMessage"));
        }
        Ok(())
    }

    /// Returns `self` with the pipeline-owned fields copied from `previous`.
    pub fn carrying_forward(mut self, previous: &GeneratedCampaign) -> Self {
        self.reference_campaigns = previous.reference_campaigns.clone();
        self.storytelling = previous.storytelling.clone();
        self
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn required_text(obj: &Map<String, Value>, field: &'static str) -> Result<String, SchemaError> {
    match obj.get(field) {
        Some(Value::String(text)) => Ok(text.trim().to_string()),
        Some(_) => Err(SchemaError::WrongType {
            field: field.to_string(),
            expected: "a string",
        }),
        None => Err(SchemaError::MissingField(field)),
    }
}

fn optional_text(obj: &Map<String, Value>, field: &str) -> Result<String, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.trim().to_string()),
        Some(Value::Array(_)) => Ok(text_list(obj, field)?.join("; ")),
        Some(_) => Err(SchemaError::WrongType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

// Lists accept a bare string (one item) and objects of strings ("key: value"
// items); anything deeper is rejected.
fn text_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, SchemaError> {
    let wrong_type = || SchemaError::WrongType {
        field: field.to_string(),
        expected: "a list of strings",
    };
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(non_empty_items([text.as_str()])),
        Some(Value::Array(rows)) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(scalar_text(row).ok_or_else(wrong_type)?);
            }
            Ok(non_empty_items(out.iter().map(String::as_str)))
        }
        Some(Value::Object(map)) => {
            let mut out = Vec::with_capacity(map.len());
            for (key, row) in map {
                let text = scalar_text(row).ok_or_else(wrong_type)?;
                out.push(format!("{key}: {text}"));
            }
            Ok(non_empty_items(out.iter().map(String::as_str)))
        }
        Some(_) => Err(wrong_type()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn non_empty_items<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
