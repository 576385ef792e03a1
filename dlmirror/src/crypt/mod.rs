//! Decryption of game database files.
//!
//! Databases ship encrypted inside the mirrored archives. Decryption is
//! delegated to a [`DecryptProvider`]; the [`ProviderRegistry`] ranks the
//! known providers and picks the first one usable on this machine.

mod command;
mod database;

pub use command::{CommandDecrypter, DECRYPTER_EXECUTABLES};
pub use database::DatabaseExtractor;

use crate::error::{MirrorError, MirrorResult};

/// A backend able to decrypt game files.
pub trait DecryptProvider {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether the backend can be used on this machine.
    fn available(&self) -> bool;

    /// Decrypt `data`, the content of the file called `basename`.
    ///
    /// The basename takes part in key derivation, so it must be the name
    /// the file had inside its archive.
    fn decrypt(&self, basename: &str, data: &[u8]) -> MirrorResult<Vec<u8>>;
}

/// Ranked list of decrypt providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn DecryptProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider in preference order.
    pub fn with_defaults() -> Self {
        Self::new().register(Box::new(CommandDecrypter::discover()))
    }

    /// Append a provider with the lowest preference so far.
    pub fn register(mut self, provider: Box<dyn DecryptProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First available provider.
    pub fn select(&self) -> MirrorResult<&dyn DecryptProvider> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.available())
            .ok_or(MirrorError::NoDecryptProvider)?;
        tracing::info!(provider = provider.name(), "Decrypter backend selected");
        Ok(provider.as_ref())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ReverseDecrypter;
    use super::*;

    #[test]
    fn test_select_first_available() {
        let registry = ProviderRegistry::new()
            .register(Box::new(CommandDecrypter::with_executable(None)))
            .register(Box::new(ReverseDecrypter { available: true }));

        assert_eq!(registry.names(), vec!["libhonoka", "reverse"]);
        let provider = registry.select().unwrap();
        assert_eq!(provider.name(), "reverse");
        assert_eq!(provider.decrypt("x.db_", b"abc").unwrap(), b"cba");
    }

    #[test]
    fn test_select_none_available() {
        let registry = ProviderRegistry::new().register(Box::new(ReverseDecrypter { available: false }));
        assert!(matches!(
            registry.select(),
            Err(MirrorError::NoDecryptProvider)
        ));
        assert!(matches!(
            ProviderRegistry::new().select(),
            Err(MirrorError::NoDecryptProvider)
        ));
    }
}
