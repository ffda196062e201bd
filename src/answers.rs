//! Hand-curated static answers, consulted before the cache and the provider.

use std::collections::HashMap;

use crate::utils::canonicalize;

/// Built-in answers, keyed by canonical prompt.
const BUILTIN_ANSWERS: &[(&str, &str)] = &[
    ("ciao", "Ciao! Come posso aiutarti oggi?"),
    ("buongiorno", "Buongiorno! Come posso esserti utile?"),
    ("buonasera", "Buonasera! Di cosa hai bisogno?"),
    ("come stai?", "Sto bene, grazie! E tu?"),
    ("grazie", "Prego! Se hai altre domande sono qui."),
    (
        "chi sei?",
        "Sono un assistente virtuale che genera risposte testuali.",
    ),
];

/// Immutable exact-match table from canonical prompt to response text.
#[derive(Debug, Clone, Default)]
pub struct StaticAnswers {
    entries: HashMap<String, String>,
}

impl StaticAnswers {
    /// Table containing only the built-in answers.
    pub fn builtin() -> Self {
        Self::from_pairs(
            BUILTIN_ANSWERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    /// Built-in answers plus `extra`, which win on conflicting keys.
    pub fn with_extra<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table = Self::builtin();
        for (prompt, answer) in extra {
            table.entries.insert(canonicalize(&prompt), answer);
        }
        table
    }

    /// Build a table from arbitrary pairs. Keys are canonicalized on the way in.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(prompt, answer)| (canonicalize(&prompt), answer))
            .collect();
        Self { entries }
    }

    /// Exact lookup by canonical key. A miss is not an error.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
