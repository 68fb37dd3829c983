use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    /// Dominated by identifiers: service names, hosts, error codes
    ServiceLookup,
    /// Descriptive symptom text
    Symptomatic,
    /// Identifiers embedded in descriptive text
    Mixed,
}

pub struct QueryClassifier;

impl QueryClassifier {
    #[must_use]
    pub fn classify(query: &str) -> QueryClass {
        let tokens: Vec<&str> = query
            .split_whitespace()
            .map(Self::strip_punct)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return QueryClass::Symptomatic;
        }

        let identifiers = tokens
            .iter()
            .filter(|t| !Self::is_question_leader(t) && Self::is_identifier_like(t))
            .count();

        if identifiers == 0 {
            return QueryClass::Symptomatic;
        }
        // "service-b", "orders-db 503", "NullPointerException in checkout-api"
        if identifiers == tokens.len() || (tokens.len() <= 3 && identifiers * 2 >= tokens.len()) {
            return QueryClass::ServiceLookup;
        }
        QueryClass::Mixed
    }

    fn is_identifier_like(token: &str) -> bool {
        let has_alpha = token.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        let has_joiner = token.contains('-') || token.contains('_') || token.contains('.');
        let has_mixed_case = token.chars().skip(1).any(|c| c.is_ascii_uppercase())
            && token.chars().any(|c| c.is_ascii_lowercase());
        let is_status_code = token.len() == 3
            && token.starts_with(|c| c == '4' || c == '5')
            && token.chars().all(|c| c.is_ascii_digit());

        is_status_code || (has_alpha && (has_joiner || has_digit || has_mixed_case))
    }

    /// Capitalised question words must not count as mixed-case identifiers.
    fn is_question_leader(token: &str) -> bool {
        matches!(
            token.to_ascii_lowercase().as_str(),
            "how" | "what" | "why" | "where" | "when" | "which" | "is" | "are" | "does" | "can"
        )
    }

    fn strip_punct(token: &str) -> &str {
        token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryClass, QueryClassifier};

    #[test]
    fn classify_service_lookup() {
        assert_eq!(QueryClassifier::classify("service-b"), QueryClass::ServiceLookup);
        assert_eq!(QueryClassifier::classify("orders-db 503"), QueryClass::ServiceLookup);
        assert_eq!(
            QueryClassifier::classify("ConnectionTimeoutException checkout-api"),
            QueryClass::ServiceLookup
        );
    }

    #[test]
    fn classify_symptomatic() {
        assert_eq!(
            QueryClassifier::classify("responses timing out under load"),
            QueryClass::Symptomatic
        );
        assert_eq!(
            QueryClassifier::classify("Why is everything slow"),
            QueryClass::Symptomatic
        );
        assert_eq!(QueryClassifier::classify("   "), QueryClass::Symptomatic);
    }

    #[test]
    fn classify_mixed() {
        assert_eq!(
            QueryClassifier::classify("service-b CPU usage spiking, responses timing out"),
            QueryClass::Mixed
        );
    }
}
