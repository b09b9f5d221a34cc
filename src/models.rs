use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Result of the PDF fetch step: the scraped title plus the server-side
/// file name of the downloaded artifact. The artifact only exists
/// between this step and the delete step of one run.
#[derive(Debug, Clone, Deserialize)]
pub struct PdfFetch {
    pub title: String,
    pub pdf: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

/// Bibliographic record returned by the search step, held for display
/// and flattened wholesale into the description request. It must
/// survive a serialize/deserialize round trip for that reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn_10: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn_13: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellerIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub shop_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingReceipt {
    #[serde(deserialize_with = "string_or_number")]
    pub listing_id: String,
}

/// Display hint for the panel: One while collecting input, Two while a
/// publish run is in flight. Never read to gate behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepIndicator {
    #[default]
    One,
    Two,
}

impl StepIndicator {
    pub fn display_index(self) -> u8 {
        match self {
            StepIndicator::One => 1,
            StepIndicator::Two => 2,
        }
    }
}

impl Serialize for StepIndicator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.display_index())
    }
}

/// Read-only view of the orchestrator state served to the panel.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub step: StepIndicator,
    pub busy: bool,
    pub pdf_url: String,
    pub book: Option<BookMetadata>,
    pub has_token: bool,
}

// Shop and listing ids arrive from the backend as either JSON numbers
// or strings, depending on which upstream service produced them.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn metadata_survives_round_trip() {
        let book = BookMetadata {
            title: "Deep Work".into(),
            authors: vec!["Cal Newport".into()],
            cover_image: Some("https://covers.example/1-L.jpg".into()),
            publish_year: Some(2016),
            publishers: vec!["Grand Central".into()],
            isbn_10: None,
            isbn_13: Some("9781455586691".into()),
            language: vec!["eng".into()],
            number_of_pages: Some(296),
            subjects: vec!["Productivity".into()],
        };
        let encoded = serde_json::to_value(&book).expect("serialize");
        let decoded: BookMetadata = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(book, decoded);
    }

    #[test]
    fn metadata_tolerates_sparse_responses() {
        let decoded: BookMetadata =
            serde_json::from_value(json!({"title": "X"})).expect("deserialize");
        assert_eq!(decoded.title, "X");
        assert!(decoded.authors.is_empty());
        assert!(decoded.cover_image.is_none());
    }

    #[test]
    fn ids_accept_numbers_and_strings() {
        let numeric: ListingReceipt =
            serde_json::from_value(json!({"listing_id": 4242})).expect("numeric id");
        assert_eq!(numeric.listing_id, "4242");
        let text: SellerIdentity =
            serde_json::from_value(json!({"shop_id": "shop-7"})).expect("string id");
        assert_eq!(text.shop_id, "shop-7");
    }

    #[test]
    fn identity_ignores_extra_fields() {
        let decoded: SellerIdentity =
            serde_json::from_value(json!({"shop_id": 9, "shop_name": "x"})).expect("deserialize");
        assert_eq!(decoded.shop_id, "9");
    }

    #[test]
    fn step_indicator_serializes_as_number() {
        assert_eq!(serde_json::to_value(StepIndicator::One).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(StepIndicator::Two).unwrap(), json!(2));
    }
}
