use serde::ser::{Serialize, SerializeMap, Serializer};

/// Canonical field name for a source attribute name.
pub fn normalize_attr_key(key: &str) -> String {
    let canonical = match key.to_ascii_lowercase().as_str() {
        "class" => "className",
        "http-equiv" => "httpEquiv",
        "accept-charset" => "acceptCharset",
        "charset" => "charSet",
        "crossorigin" => "crossOrigin",
        "referrerpolicy" => "referrerPolicy",
        "hreflang" => "hrefLang",
        "srcset" => "srcSet",
        "content-security-policy" => "contentSecurityPolicy",
        "tabindex" => "tabIndex",
        "readonly" => "readOnly",
        "maxlength" => "maxLength",
        "minlength" => "minLength",
        _ => return key.to_string(),
    };
    canonical.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            AttrValue::Flag(_) => None,
        }
    }
}

/// Attributes of one element, keyed by canonical name, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrMap(Vec<(String, AttrValue)>);

impl AttrMap {
    /// Build from raw `(name, value)` pairs. Empty and self-named values
    /// become `true`.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = AttrMap::default();
        for (name, value) in pairs {
            let attr_value = if value.is_empty() || value == name {
                AttrValue::Flag(true)
            } else {
                AttrValue::Text(value)
            };
            map.insert(normalize_attr_key(&name), attr_value);
        }
        map
    }

    pub fn insert(&mut self, key: String, value: AttrValue) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for AttrMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScriptDescriptor {
    #[serde(flatten)]
    pub attrs: AttrMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
}

/// Structural capture of one mirrored page, stored as the route's document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub route: String,
    pub title: String,
    pub meta: Vec<AttrMap>,
    pub links: Vec<AttrMap>,
    pub styles: Vec<String>,
    pub scripts: Vec<ScriptDescriptor>,
    pub body_html: String,
    pub body_attrs: AttrMap,
    pub html_attrs: AttrMap,
}
