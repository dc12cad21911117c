//! Hazard classification of route guides and place names
//!
//! Which words and maneuver codes mark a camera depends on the routing provider and the
//! locale, so both sets are plain data. Matching is membership only.

use crate::route::Guide;
use std::collections::HashSet;

/// Keywords matched case-insensitively against guide label + narrative
const DEFAULT_KEYWORDS: &[&str] = &[
    "speed",
    "camera",
    "enforcement",
    "cctv",
    "section control",
    "section-control",
    "red light",
    "radar",
    "과속",
    "단속",
    "카메라",
    "구간단속",
    "신호위반",
];

/// Classifies guides as safety-enforcement related
#[derive(Debug, Clone)]
pub struct HazardClassifier {
    keywords: Vec<String>,
    maneuver_types: HashSet<i32>,
}

impl Default for HazardClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied(), [])
    }
}

impl HazardClassifier {
    pub fn new<K, S>(keywords: K, maneuver_types: impl IntoIterator<Item = i32>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            maneuver_types: maneuver_types.into_iter().collect(),
        }
    }

    /// Add keywords on top of the current set
    pub fn with_keywords<S: AsRef<str>>(mut self, extra: impl IntoIterator<Item = S>) -> Self {
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    /// Add provider maneuver codes that always denote a camera
    pub fn with_maneuver_types(mut self, extra: impl IntoIterator<Item = i32>) -> Self {
        self.maneuver_types.extend(extra);
        self
    }

    /// Whether free text mentions any hazard keyword
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn is_hazard(&self, guide: &Guide) -> bool {
        if guide
            .maneuver_type
            .is_some_and(|t| self.maneuver_types.contains(&t))
        {
            return true;
        }
        self.matches_text(&guide.label) || self.matches_text(&guide.narrative)
    }

    /// The hazard subset of `guides`, order preserved
    pub fn hazard_guides(&self, guides: &[Guide]) -> Vec<Guide> {
        guides.iter().filter(|g| self.is_hazard(g)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Coordinate;

    fn guide(id: &str, label: &str, narrative: &str, maneuver: Option<i32>) -> Guide {
        Guide {
            id: id.to_string(),
            label: label.to_string(),
            narrative: narrative.to_string(),
            coordinate: Coordinate::new(37.5, 127.0),
            distance_meters: None,
            duration_seconds: None,
            maneuver_type: maneuver,
        }
    }

    #[test]
    fn test_keyword_classification() {
        let classifier = HazardClassifier::default();

        assert!(classifier.is_hazard(&guide("1", "Speed Camera", "", None)));
        assert!(classifier.is_hazard(&guide("2", "", "CCTV enforcement ahead", None)));
        assert!(classifier.is_hazard(&guide("3", "구간단속 시작", "", None)));
        assert!(!classifier.is_hazard(&guide("4", "Turn left", "onto Gangnam-daero", None)));
    }

    #[test]
    fn test_maneuver_type_classification() {
        let classifier = HazardClassifier::default().with_maneuver_types([1001, 1002]);

        assert!(classifier.is_hazard(&guide("1", "", "", Some(1001))));
        assert!(!classifier.is_hazard(&guide("2", "", "", Some(12))));
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = HazardClassifier::new(["Blitzer"], []).with_keywords(["  ", "flash"]);

        assert!(classifier.matches_text("BLITZER 50"));
        assert!(classifier.matches_text("Flash zone"));
        assert!(!classifier.matches_text("speed camera"));
    }

    #[test]
    fn test_hazard_guides_preserve_order() {
        let classifier = HazardClassifier::default();
        let guides = vec![
            guide("a", "Speed camera", "", None),
            guide("b", "Turn right", "", None),
            guide("c", "Red light camera", "", None),
        ];

        let ids: Vec<_> = classifier
            .hazard_guides(&guides)
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
