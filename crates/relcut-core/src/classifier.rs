//! Application classification.
//!
//! An application is either an operator (one bundle component aggregating
//! N satellite components) or an FBC catalog (exactly one component). The
//! shape decides which component's snapshots are release candidates.

use std::fmt;

use relcut_state::labels::{
    APPLICATION_TYPE_LABEL, BUNDLE_REFERENCE_LABEL, COMPONENT_BUNDLE_TYPE, COMPONENT_TYPE_LABEL,
    FBC_APPLICATION_TYPE, OPERATOR_APPLICATION_TYPE,
};
use relcut_state::{Application, Component, LabelSelector, RecordStore};
use tracing::debug;

use crate::error::{ReleaseError, Result};

/// Supported application shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationShape {
    Operator,
    Fbc,
}

impl ApplicationShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationShape::Operator => OPERATOR_APPLICATION_TYPE,
            ApplicationShape::Fbc => FBC_APPLICATION_TYPE,
        }
    }
}

impl fmt::Display for ApplicationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the shape from the application's type label.
pub fn classify(application: &Application) -> Result<ApplicationShape> {
    let meta = &application.metadata;
    match meta.label(APPLICATION_TYPE_LABEL) {
        Some(OPERATOR_APPLICATION_TYPE) => Ok(ApplicationShape::Operator),
        Some(FBC_APPLICATION_TYPE) => Ok(ApplicationShape::Fbc),
        Some(other) => Err(ReleaseError::UnsupportedApplicationType {
            namespace: meta.namespace.clone(),
            application: meta.name.clone(),
            app_type: other.to_string(),
        }),
        None => Err(ReleaseError::MissingLabel {
            label: APPLICATION_TYPE_LABEL,
            kind: "application",
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }),
    }
}

/// Components owned by `application`, sorted by name.
pub async fn list_application_components(
    store: &dyn RecordStore,
    namespace: &str,
    application: &str,
) -> Result<Vec<Component>> {
    let mut components: Vec<Component> = store
        .list_components(namespace, &LabelSelector::new())
        .await?
        .into_iter()
        .filter(|c| c.spec.application == application)
        .collect();
    components.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(components)
}

/// The single component labelled as the bundle.
pub fn bundle_component<'a>(
    components: &'a [Component],
    namespace: &str,
    application: &str,
) -> Result<&'a Component> {
    let bundles: Vec<&Component> = components
        .iter()
        .filter(|c| c.metadata.label(COMPONENT_TYPE_LABEL) == Some(COMPONENT_BUNDLE_TYPE))
        .collect();
    match bundles.as_slice() {
        [bundle] => Ok(bundle),
        [] => Err(ReleaseError::NoBundleComponent {
            namespace: namespace.to_string(),
            application: application.to_string(),
        }),
        many => Err(ReleaseError::MultipleBundleComponents {
            namespace: namespace.to_string(),
            application: application.to_string(),
            components: many.iter().map(|c| c.metadata.name.clone()).collect(),
        }),
    }
}

/// The component whose snapshots are released for this shape.
pub fn release_component<'a>(
    shape: ApplicationShape,
    components: &'a [Component],
    namespace: &str,
    application: &str,
) -> Result<&'a Component> {
    match shape {
        ApplicationShape::Operator => bundle_component(components, namespace, application),
        ApplicationShape::Fbc => match components {
            [only] => Ok(only),
            _ => Err(ReleaseError::ComponentCount {
                namespace: namespace.to_string(),
                application: application.to_string(),
                count: components.len(),
            }),
        },
    }
}

/// Everything selection and manifest generation need to know about an
/// application, loaded once per invocation.
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    pub namespace: String,
    pub application: Application,
    pub shape: ApplicationShape,
    pub components: Vec<Component>,
    release_component: usize,
}

impl ApplicationContext {
    pub async fn load(store: &dyn RecordStore, namespace: &str, application: &str) -> Result<Self> {
        let app = store.get_application(namespace, application).await?;
        let shape = classify(&app)?;
        let components = list_application_components(store, namespace, application).await?;
        Self::from_parts(namespace, app, shape, components)
    }

    fn from_parts(
        namespace: &str,
        application: Application,
        shape: ApplicationShape,
        components: Vec<Component>,
    ) -> Result<Self> {
        let chosen = release_component(shape, &components, namespace, &application.metadata.name)?;
        let release_component = components
            .iter()
            .position(|c| c.metadata.name == chosen.metadata.name)
            .unwrap_or_default();
        debug!(
            application = %application.metadata.name,
            shape = %shape,
            component = %chosen.metadata.name,
            "classified application"
        );
        Ok(Self {
            namespace: namespace.to_string(),
            application,
            shape,
            components,
            release_component,
        })
    }

    pub fn name(&self) -> &str {
        &self.application.metadata.name
    }

    /// Bundle component for operators, the sole component for FBC.
    pub fn release_component(&self) -> &Component {
        &self.components[self.release_component]
    }

    /// Components other than the release component.
    pub fn satellites(&self) -> impl Iterator<Item = &Component> {
        let release = self.release_component;
        self.components
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != release)
            .map(|(_, c)| c)
    }
}

/// Alias under which the bundle records a satellite's digest.
pub fn bundle_reference(component: &Component) -> Result<&str> {
    component
        .metadata
        .label(BUNDLE_REFERENCE_LABEL)
        .ok_or_else(|| ReleaseError::MissingLabel {
            label: BUNDLE_REFERENCE_LABEL,
            kind: "component",
            namespace: component.metadata.namespace.clone(),
            name: component.metadata.name.clone(),
        })
}
