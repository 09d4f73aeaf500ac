/*!
 * Flow trigger cards fired by remote controllers.
 */
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use meshdrivers_core::types::Value;

use crate::host::Translator;

/// Trigger card matched on the pressed button and scene
pub const WALL_CONTROLLER_SCENE_CARD: &str = "WallController_scene";
/// Trigger card exposing the button and scene as tokens
pub const WALL_CONTROLLER_BUTTON_CARD: &str = "WallController_button";

/// The button and scene a remote command resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteValue {
    /// Button label
    pub button: String,
    /// Scene label
    pub scene: String,
}

impl RemoteValue {
    /// Convert to the token object handed to the host
    pub fn to_value(&self) -> Value {
        let mut object = HashMap::new();
        object.insert("button".to_string(), Value::from(self.button.as_str()));
        object.insert("scene".to_string(), Value::from(self.scene.as_str()));
        Value::Object(object)
    }
}

/// Which argument of a flow card is being completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocompleteKind {
    /// Scene argument
    Scene,
    /// Button argument
    Button,
}

/// One autocomplete suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteItem {
    /// The untranslated label, matched against trigger state
    pub id: String,
    /// The label shown to the user
    pub name: String,
}

/// Build autocomplete suggestions from labels, in order, keeping those whose
/// translated name contains `query` regardless of case
pub fn autocomplete<'a, I>(labels: I, query: &str, translator: &dyn Translator) -> Vec<AutocompleteItem>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = query.to_lowercase();
    labels
        .into_iter()
        .map(|label| AutocompleteItem {
            id: label.to_string(),
            name: translator.translate(label),
        })
        .filter(|item| item.name.to_lowercase().contains(&query))
        .collect()
}

/// Arguments the user picked on the scene trigger card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCardArgs {
    /// Selected button
    pub button: AutocompleteItem,
    /// Selected scene
    pub scene: AutocompleteItem,
}

impl SceneCardArgs {
    /// Whether a fired trigger state satisfies these arguments
    pub fn matches(&self, state: &RemoteValue) -> bool {
        self.button.id == state.button && self.scene.id == state.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;

    const SCENES: [&str; 3] = ["Switched ON", "Switched OFF", "Dimming UP"];

    #[test]
    fn test_empty_query_returns_all_in_order() {
        let items = autocomplete(SCENES, "", &Catalog::identity());
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, SCENES);
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let items = autocomplete(SCENES, "switched", &Catalog::identity());
        assert_eq!(items.len(), 2);

        let items = autocomplete(SCENES, "uP", &Catalog::identity());
        assert_eq!(items, vec![AutocompleteItem { id: "Dimming UP".into(), name: "Dimming UP".into() }]);

        assert!(autocomplete(SCENES, "stop", &Catalog::identity()).is_empty());
    }

    #[test]
    fn test_filter_uses_translated_name() {
        let mut catalog = Catalog::identity();
        catalog.insert("Switched ON", "Ingeschakeld");
        let items = autocomplete(SCENES, "inge", &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "Switched ON");
        assert_eq!(items[0].name, "Ingeschakeld");
    }

    #[test]
    fn test_remote_value_tokens() {
        let remote = RemoteValue { button: "Group2".into(), scene: "Dimming DOWN".into() };
        let value = remote.to_value();
        assert_eq!(value.field("button").and_then(Value::as_str), Some("Group2"));
        assert_eq!(value.field("scene").and_then(Value::as_str), Some("Dimming DOWN"));
    }

    #[test]
    fn test_scene_card_matching() {
        let item = |s: &str| AutocompleteItem { id: s.into(), name: s.into() };
        let args = SceneCardArgs { button: item("Group1"), scene: item("Switched ON") };

        assert!(args.matches(&RemoteValue { button: "Group1".into(), scene: "Switched ON".into() }));
        assert!(!args.matches(&RemoteValue { button: "Group2".into(), scene: "Switched ON".into() }));
        assert!(!args.matches(&RemoteValue { button: "Group1".into(), scene: "Dimming UP".into() }));
    }
}
