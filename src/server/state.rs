use crate::catalog::{Catalog, TranslatorConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::providers::Provider;
use crate::translator::Translator;

pub(crate) struct ServerState<P: Provider> {
    pub(crate) catalog: Catalog,
    pub(crate) translator: Translator<P>,
}

impl<P: Provider> ServerState<P> {
    pub(crate) fn tool(&self, name: &str) -> ServiceResult<&TranslatorConfig> {
        self.catalog
            .get(name)
            .ok_or_else(|| ServiceError::UnknownTranslator(name.to_string()))
    }
}
