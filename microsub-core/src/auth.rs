use std::collections::HashMap;

use serde::Deserialize;

/// What a valid access token allows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Grant {
    pub user_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Grant {
    pub fn new(user_id: impl Into<String>, scopes: &[&str]) -> Self {
        Grant {
            user_id: user_id.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Result of resolving a request's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Missing,
    Invalid,
    Granted(Grant),
}

/// Static bearer tokens and the grants they carry.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, Grant>,
}

impl TokenTable {
    pub fn new() -> Self {
        TokenTable::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, grant: Grant) {
        self.tokens.insert(token.into(), grant);
    }

    pub fn resolve(&self, token: Option<&str>) -> Auth {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            None => Auth::Missing,
            Some(token) => self
                .tokens
                .get(token)
                .cloned()
                .map_or(Auth::Invalid, Auth::Granted),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}
