use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::game::BggId;

/// One hit returned by the backend's BGG search proxy.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub bgg_id: BggId,
    pub name: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_players: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_players: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub duration_min: Option<u32>,
}

impl SearchItem {
    /// `Catan (3-4p • 90m)`, with `?` for unknown numbers.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}-{}p • {}m)",
            self.name,
            question_mark(self.min_players),
            question_mark(self.max_players),
            question_mark(self.duration_min),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionRef {
    pub bgg_id: BggId,
    pub name: String,
}

/// Full game details from the backend's BGG thing proxy.
///
/// The backend expects the thing back unchanged when a table or want-to-play
/// post is created, so fields this client does not model are carried along.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    pub bgg_id: BggId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub min_players: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u32>,
    #[serde(default)]
    pub expansions: Vec<ExpansionRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn question_mark(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_owned(), |value| value.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u32(self) -> Option<u32> {
        match self {
            NumberOrString::Number(number) => u32::try_from(number).ok(),
            NumberOrString::String(string) => string.trim().parse().ok(),
        }
    }
}

/// The proxy is not consistent about numbers: accepts `4`, `"4"`, `""` and `null`.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<NumberOrString>::deserialize(deserializer)?.and_then(NumberOrString::into_u32))
}

impl<'de> Deserialize<'de> for BggId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NumberOrString::deserialize(deserializer)?
            .into_u32()
            .map(BggId)
            .ok_or_else(|| serde::de::Error::custom("BGG id should be a non-negative integer"))
    }
}

impl Serialize for BggId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{SearchItem, Thing};
    use crate::models::BggId;

    #[test]
    fn search_item_with_loose_numbers() {
        let item: SearchItem = serde_json::from_value(json!({
            "bggId": "13",
            "name": "Catan",
            "minPlayers": 3,
            "maxPlayers": "4",
            "durationMin": "",
        }))
        .unwrap();

        assert_eq!(item.bgg_id, BggId(13));
        assert_eq!(item.min_players, Some(3));
        assert_eq!(item.max_players, Some(4));
        assert_eq!(item.duration_min, None);
        assert_eq!(item.summary(), "Catan (3-4p • ?m)");
    }

    #[test]
    fn thing_keeps_unknown_fields() {
        let source = json!({
            "bggId": 13,
            "name": "Catan",
            "thumbUrl": "https://cf.geekdo-images.com/catan.jpg",
            "minPlayers": 3,
            "maxPlayers": 4,
            "durationMin": 90,
            "expansions": [{ "bggId": 926, "name": "Catan: Seafarers" }],
        });

        let thing: Thing = serde_json::from_value(source.clone()).unwrap();
        assert_eq!(thing.expansions.len(), 1);
        assert_eq!(thing.extra.get("durationMin"), Some(&json!(90)));

        assert_eq!(serde_json::to_value(&thing).unwrap(), source);
    }
}
