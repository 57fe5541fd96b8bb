use std::fmt;

use tracing::debug;

use crate::error::{KeyError, KeyResult};
use crate::generator::KeyGenerator;

/// Separator placed between the sub-keys of a composite key.
///
/// Sub-generators may not emit it themselves, so a composite key always
/// splits back into exactly one segment per part.
pub const KEY_SEPARATOR: char = '/';

/// Joins the output of several generators, in registration order.
///
/// For example, a sequential part followed by a name part yields keys such
/// as `000042/report.pdf`. Generation fails if any part fails, returns an
/// empty sub-key, or returns a sub-key containing [`KEY_SEPARATOR`].
#[derive(Default)]
pub struct CompositeKeyGenerator {
    parts: Vec<Box<dyn KeyGenerator>>,
}

impl CompositeKeyGenerator {
    /// Create a composite with no parts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part; builder style.
    pub fn with(mut self, part: impl KeyGenerator + 'static) -> Self {
        self.push(Box::new(part));
        self
    }

    /// Append a part to the end of the sequence.
    pub fn push(&mut self, part: Box<dyn KeyGenerator>) {
        self.parts.push(part);
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if no parts are registered.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl KeyGenerator for CompositeKeyGenerator {
    fn name(&self) -> &str {
        "composite"
    }

    fn create_key(&self, original_name: Option<&str>) -> KeyResult<String> {
        if self.parts.is_empty() {
            return Err(KeyError::NoParts);
        }

        let mut key = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            let sub = part.create_key(original_name)?;
            if sub.is_empty() {
                return Err(KeyError::EmptyKey {
                    strategy: part.name().to_string(),
                });
            }
            if sub.contains(KEY_SEPARATOR) {
                return Err(KeyError::ReservedSeparator {
                    key: sub,
                    separator: KEY_SEPARATOR,
                });
            }
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(&sub);
        }

        debug!(key = %key, parts = self.parts.len(), "composite key created");
        Ok(key)
    }
}

impl fmt::Debug for CompositeKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.parts.iter().map(|p| p.name()).collect();
        f.debug_struct("CompositeKeyGenerator")
            .field("parts", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{DelegatingKeyGenerator, NameKeyGenerator};
    use crate::sequential::SequentialKeyGenerator;

    #[test]
    fn joins_parts_in_registration_order() {
        let g = CompositeKeyGenerator::new()
            .with(DelegatingKeyGenerator::new("tenant", |_| Ok("t1".into())))
            .with(SequentialKeyGenerator::new(1, 1).with_width(4))
            .with(NameKeyGenerator);

        assert_eq!(g.create_key(Some("a.txt")).unwrap(), "t1/0001/a.txt");
        assert_eq!(g.create_key(Some("b.txt")).unwrap(), "t1/0002/b.txt");
    }

    #[test]
    fn single_part_has_no_separator() {
        let g = CompositeKeyGenerator::new().with(SequentialKeyGenerator::new(5, 1));
        assert_eq!(g.create_key(None).unwrap(), "5");
    }

    #[test]
    fn empty_composite_fails() {
        assert_eq!(
            CompositeKeyGenerator::new().create_key(None),
            Err(KeyError::NoParts)
        );
    }

    #[test]
    fn failing_part_fails_the_whole_key() {
        let g = CompositeKeyGenerator::new()
            .with(SequentialKeyGenerator::default())
            .with(NameKeyGenerator);
        let err = g.create_key(None).unwrap_err();
        assert_eq!(err, KeyError::NameRequired { strategy: "name" });
    }

    #[test]
    fn separator_in_sub_key_is_rejected() {
        let g = CompositeKeyGenerator::new()
            .with(DelegatingKeyGenerator::new("bad", |_| Ok("a/b".into())));
        assert!(matches!(
            g.create_key(None),
            Err(KeyError::ReservedSeparator { .. })
        ));
    }

    #[test]
    fn empty_sub_key_is_rejected() {
        let g = CompositeKeyGenerator::new()
            .with(DelegatingKeyGenerator::new("blank", |_| Ok(String::new())));
        assert_eq!(
            g.create_key(None),
            Err(KeyError::EmptyKey {
                strategy: "blank".into()
            })
        );
    }

    #[test]
    fn debug_lists_part_names() {
        let g = CompositeKeyGenerator::new()
            .with(SequentialKeyGenerator::default())
            .with(NameKeyGenerator);
        let dbg = format!("{g:?}");
        assert!(dbg.contains("sequential"));
        assert!(dbg.contains("name"));
        assert_eq!(g.len(), 2);
    }
}
