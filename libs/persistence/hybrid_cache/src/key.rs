use std::{borrow::Borrow, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

/// Separator between the fields of a cache key.
pub const DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid cache key argument: {0}")]
    InvalidArgument(String),
}

impl KeyError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Entities whose reads are cached.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Customer,
    Order,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] =
        [EntityKind::Product, EntityKind::Customer, EntityKind::Order];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "customer" => Ok(Self::Customer),
            "order" => Ok(Self::Order),
            other => Err(KeyError::invalid(format!("unknown entity `{other}`"))),
        }
    }
}

/// The operation field of a key.
///
/// `By(entity)` is a secondary dimension: the orders of one customer live
/// under `order:customer:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOperation {
    All,
    Id,
    Page,
    By(EntityKind),
}

/// Classes the TTL table is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    List,
    Item,
}

impl KeyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Id => "id",
            Self::Page => "page",
            Self::By(entity) => entity.as_str(),
        }
    }

    pub fn takes_identifier(&self) -> bool { !matches!(self, Self::All) }

    pub fn is_list(&self) -> bool { matches!(self, Self::All | Self::Page) }

    pub fn class(&self) -> OperationClass {
        if self.is_list() {
            OperationClass::List
        }
        else {
            OperationClass::Item
        }
    }
}

impl FromStr for KeyOperation {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "id" => Ok(Self::Id),
            "page" => Ok(Self::Page),
            other => {
                other.parse::<EntityKind>().map(Self::By).map_err(|_| {
                    KeyError::invalid(format!("unknown operation `{other}`"))
                })
            }
        }
    }
}

/// A fully built `version:entity:operation[:identifier]` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates every field and assembles the key.
    pub fn build(
        version: &str, entity: &str, operation: &str, identifier: Option<u64>,
    ) -> Result<Self, KeyError> {
        check_field("version", version)?;
        check_field("entity", entity)?;
        check_field("operation", operation)?;
        entity.parse::<EntityKind>()?;
        let op = operation.parse::<KeyOperation>()?;

        let key = match (op.takes_identifier(), identifier) {
            (true, Some(id)) => {
                format!("{version}{DELIMITER}{entity}{DELIMITER}{operation}{DELIMITER}{id}")
            }
            (false, None) => {
                format!("{version}{DELIMITER}{entity}{DELIMITER}{operation}")
            }
            (true, None) => {
                return Err(KeyError::invalid(format!(
                    "operation `{operation}` requires an identifier"
                )));
            }
            (false, Some(_)) => {
                return Err(KeyError::invalid(format!(
                    "operation `{operation}` does not take an identifier"
                )));
            }
        };

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn into_string(self) -> String { self.0 }

    pub fn parse(&self) -> Result<ParsedKey<'_>, KeyError> { parse(&self.0) }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str { &self.0 }
}

fn check_field(name: &str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::invalid(format!("{name} must not be empty")));
    }
    if !value.is_ascii() {
        return Err(KeyError::invalid(format!("{name} `{value}` is not ASCII")));
    }
    if value.contains(DELIMITER) {
        return Err(KeyError::invalid(format!(
            "{name} `{value}` contains the `{DELIMITER}` delimiter"
        )));
    }
    Ok(())
}

/// The fields of a key, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedKey<'k> {
    pub version: &'k str,
    pub entity: EntityKind,
    pub operation: KeyOperation,
    pub identifier: Option<u64>,
}

/// Inverse of [`CacheKey::build`].
pub fn parse(key: &str) -> Result<ParsedKey<'_>, KeyError> {
    let mut fields = key.split(DELIMITER);
    let (Some(version), Some(entity), Some(operation)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(KeyError::invalid(format!("malformed key `{key}`")));
    };
    let identifier = fields
        .next()
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                KeyError::invalid(format!("identifier `{raw}` is not decimal"))
            })
        })
        .transpose()?;
    if fields.next().is_some() {
        return Err(KeyError::invalid(format!("too many fields in `{key}`")));
    }

    let parsed = ParsedKey {
        version,
        entity: entity.parse()?,
        operation: operation.parse()?,
        identifier,
    };
    if parsed.version.is_empty()
        || parsed.operation.takes_identifier() != identifier.is_some()
    {
        return Err(KeyError::invalid(format!("malformed key `{key}`")));
    }
    Ok(parsed)
}

/// Entity field of `key`, `None` when the key has fewer than three fields.
pub fn entity_of(key: &str) -> Option<&str> {
    let mut fields = key.split(DELIMITER);
    let _version = fields.next()?;
    let entity = fields.next()?;
    fields.next()?;
    Some(entity)
}

pub fn is_list_key(key: &str) -> bool {
    matches!(key.split(DELIMITER).nth(2), Some("all" | "page"))
}

/// Builds keys for one version token.
///
/// Bumping the version produces a disjoint key space, so entries written
/// under the previous token are never read again.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    version: Arc<str>,
    max_key_length: usize,
}

impl KeyBuilder {
    pub fn new(
        version: impl Into<String>, max_key_length: usize,
    ) -> Result<Self, KeyError> {
        let version = version.into();
        check_field("version", &version)?;
        Ok(Self {
            version: version.into(),
            max_key_length,
        })
    }

    pub fn version(&self) -> &str { &self.version }

    pub fn build(
        &self, entity: EntityKind, operation: KeyOperation,
        identifier: Option<u64>,
    ) -> Result<CacheKey, KeyError> {
        let key = CacheKey::build(
            &self.version,
            entity.as_str(),
            operation.as_str(),
            identifier,
        )?;
        if key.as_str().len() > self.max_key_length {
            return Err(KeyError::invalid(format!(
                "key `{key}` is longer than {} bytes",
                self.max_key_length
            )));
        }
        Ok(key)
    }

    pub fn all(&self, entity: EntityKind) -> Result<CacheKey, KeyError> {
        self.build(entity, KeyOperation::All, None)
    }

    pub fn item(
        &self, entity: EntityKind, id: i64,
    ) -> Result<CacheKey, KeyError> {
        self.build(entity, KeyOperation::Id, Some(non_negative(id)?))
    }

    pub fn page(
        &self, entity: EntityKind, page: u32,
    ) -> Result<CacheKey, KeyError> {
        self.build(entity, KeyOperation::Page, Some(u64::from(page)))
    }

    pub fn related(
        &self, entity: EntityKind, related: EntityKind, id: i64,
    ) -> Result<CacheKey, KeyError> {
        self.build(entity, KeyOperation::By(related), Some(non_negative(id)?))
    }

    /// Prefix shared by every key of `entity` under this version.
    pub fn pattern_for(&self, entity: EntityKind) -> String {
        format!("{}{DELIMITER}{}{DELIMITER}", self.version, entity.as_str())
    }
}

fn non_negative(id: i64) -> Result<u64, KeyError> {
    u64::try_from(id).map_err(|_| {
        KeyError::invalid(format!("identifier {id} is negative"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> KeyBuilder { KeyBuilder::new("v1", 256).unwrap() }

    #[test]
    fn builds_documented_layout() {
        let keys = builder();
        assert_eq!(
            keys.item(EntityKind::Product, 5).unwrap().as_str(),
            "v1:product:id:5"
        );
        assert_eq!(
            keys.all(EntityKind::Product).unwrap().as_str(),
            "v1:product:all"
        );
        assert_eq!(
            keys.page(EntityKind::Customer, 3).unwrap().as_str(),
            "v1:customer:page:3"
        );
        assert_eq!(
            keys.related(EntityKind::Order, EntityKind::Customer, 1)
                .unwrap()
                .as_str(),
            "v1:order:customer:1"
        );
    }

    #[test]
    fn round_trips_every_operation() {
        let keys = builder();
        for entity in EntityKind::ALL {
            let cases = [
                (KeyOperation::All, None),
                (KeyOperation::Id, Some(42)),
                (KeyOperation::Page, Some(1)),
                (KeyOperation::By(EntityKind::Customer), Some(0)),
            ];
            for (operation, identifier) in cases {
                let key = keys.build(entity, operation, identifier).unwrap();
                let parsed = key.parse().unwrap();

                assert_eq!(entity_of(key.as_str()), Some(entity.as_str()));
                assert_eq!(is_list_key(key.as_str()), operation.is_list());
                assert_eq!(parsed.version, "v1");
                assert_eq!(parsed.entity, entity);
                assert_eq!(parsed.operation, operation);
                assert_eq!(parsed.identifier, identifier);
            }
        }
    }

    #[test]
    fn rejects_delimiter_in_fields() {
        assert!(matches!(
            CacheKey::build("v1", "pro:duct", "all", None),
            Err(KeyError::InvalidArgument(_))
        ));
        assert!(CacheKey::build("v1", "product", "i:d", Some(1)).is_err());
        assert!(CacheKey::build("v:1", "product", "all", None).is_err());
        assert!(KeyBuilder::new("v:2", 256).is_err());
    }

    #[test]
    fn identifier_presence_must_match_operation() {
        assert!(CacheKey::build("v1", "product", "id", None).is_err());
        assert!(CacheKey::build("v1", "product", "page", None).is_err());
        assert!(CacheKey::build("v1", "order", "customer", None).is_err());
        assert!(CacheKey::build("v1", "product", "all", Some(3)).is_err());
    }

    #[test]
    fn rejects_unknown_names_and_negative_ids() {
        assert!(CacheKey::build("v1", "invoice", "all", None).is_err());
        assert!(CacheKey::build("v1", "product", "latest", None).is_err());
        assert!(builder().item(EntityKind::Product, -1).is_err());
    }

    #[test]
    fn enforces_max_key_length() {
        let keys = KeyBuilder::new("v1", 12).unwrap();
        assert!(keys.all(EntityKind::Order).is_ok());
        assert!(keys.item(EntityKind::Customer, 123_456).is_err());
    }

    #[test]
    fn entity_of_needs_three_fields() {
        assert_eq!(entity_of("v1:product"), None);
        assert_eq!(entity_of("v1"), None);
        assert_eq!(entity_of("v1:order:all"), Some("order"));
        assert!(!is_list_key("v1:order"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("v1:product:id:five").is_err());
        assert!(parse("v1:product:id:5:extra").is_err());
        assert!(parse("v1:product:id").is_err());
        assert!(parse(":product:all").is_err());
    }

    #[test]
    fn pattern_prefixes_every_key_of_the_entity() {
        let keys = builder();
        let prefix = keys.pattern_for(EntityKind::Order);
        assert_eq!(prefix, "v1:order:");
        assert!(
            keys.related(EntityKind::Order, EntityKind::Customer, 9)
                .unwrap()
                .as_str()
                .starts_with(&prefix)
        );
        assert!(
            !keys
                .all(EntityKind::Product)
                .unwrap()
                .as_str()
                .starts_with(&prefix)
        );
    }

    #[test]
    fn version_bump_changes_every_key() {
        let v1 = builder();
        let v2 = KeyBuilder::new("v2", 256).unwrap();
        assert_ne!(
            v1.item(EntityKind::Product, 5).unwrap(),
            v2.item(EntityKind::Product, 5).unwrap()
        );
    }
}
