use serde::{Deserialize, Serialize};

use crate::composite::CompositeKeyGenerator;
use crate::generator::{KeyGenerator, NameKeyGenerator, UuidKeyGenerator};
use crate::sequential::SequentialKeyGenerator;

/// Declarative description of a key strategy, loadable from configuration.
///
/// ```toml
/// [keys]
/// kind = "composite"
/// parts = [
///     { kind = "sequential", start = 1, width = 8 },
///     { kind = "name" },
/// ]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Random UUIDv7 keys.
    Uuid,
    /// Numeric keys from an atomic counter.
    Sequential {
        #[serde(default = "default_start")]
        start: u64,
        #[serde(default = "default_step")]
        step: u64,
        #[serde(default)]
        width: usize,
    },
    /// Slug of the original file name.
    Name,
    /// Ordered join of other strategies.
    Composite { parts: Vec<KeyStrategy> },
}

fn default_start() -> u64 {
    1
}

fn default_step() -> u64 {
    1
}

impl Default for KeyStrategy {
    fn default() -> Self {
        Self::Uuid
    }
}

impl KeyStrategy {
    /// Instantiate the generator this strategy describes.
    pub fn build(&self) -> Box<dyn KeyGenerator> {
        match self {
            Self::Uuid => Box::new(UuidKeyGenerator),
            Self::Sequential { start, step, width } => {
                Box::new(SequentialKeyGenerator::new(*start, *step).with_width(*width))
            }
            Self::Name => Box::new(NameKeyGenerator),
            Self::Composite { parts } => {
                let mut composite = CompositeKeyGenerator::new();
                for part in parts {
                    composite.push(part.build());
                }
                Box::new(composite)
            }
        }
    }
}
