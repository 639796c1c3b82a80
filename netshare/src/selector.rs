/// Represents ways to locate a UI element on the active screen
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by visible text
    Text(String),
    /// Select by content description (accessibility label)
    Description(String),
    /// Match any of the alternatives, earlier alternatives take priority
    AnyOf(Vec<Selector>),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Text(t) => write!(f, "text:{t}"),
            Selector::Description(d) => write!(f, "desc:{d}"),
            Selector::AnyOf(alternatives) => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        // Handle alternation first
        let parts: Vec<&str> = s.split("||").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::AnyOf(parts.into_iter().map(Selector::from).collect());
        }

        let s = s.trim();
        if let Some(desc) = s.strip_prefix("desc:") {
            return Selector::Description(desc.to_string());
        }
        Selector::Text(s.strip_prefix("text:").unwrap_or(s).to_string())
    }
}

impl Selector {
    /// Build a selector matching any of the labels, as text or as content description
    pub fn any_label<S: AsRef<str>>(labels: &[S]) -> Selector {
        let mut alternatives = Vec::with_capacity(labels.len() * 2);
        for label in labels {
            alternatives.push(Selector::Text(label.as_ref().to_string()));
        }
        for label in labels {
            alternatives.push(Selector::Description(label.as_ref().to_string()));
        }
        Selector::AnyOf(alternatives)
    }

    /// Flatten nested alternation into the ordered list of leaf selectors
    pub fn alternatives(&self) -> Vec<&Selector> {
        match self {
            Selector::AnyOf(inner) => inner.iter().flat_map(|s| s.alternatives()).collect(),
            leaf => vec![leaf],
        }
    }
}
