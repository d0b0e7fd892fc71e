//! Converter registry - one backend per format category

use crate::traits::Converter;
use convertease_core::models::FormatCategory;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<FormatCategory, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Every backend compiled into this build.
    #[allow(unused_variables, unused_mut)]
    pub fn builtin(max_output_pixels: u64) -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "image")]
        registry.register(
            FormatCategory::Image,
            Arc::new(crate::image::ImageConverter::new(max_output_pixels)),
        );

        #[cfg(feature = "document")]
        registry.register(
            FormatCategory::Document,
            Arc::new(crate::document::DocumentConverter::new()),
        );

        registry
    }

    /// Replace the backend for a category
    pub fn register(&mut self, category: FormatCategory, converter: Arc<dyn Converter>) {
        tracing::debug!(category = %category, backend = converter.name(), "Registered converter");
        self.converters.insert(category, converter);
    }

    pub fn get(&self, category: FormatCategory) -> Option<Arc<dyn Converter>> {
        self.converters.get(&category).cloned()
    }
}
