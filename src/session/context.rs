//! Session context descriptors.
//!
//! A [`SessionContext`] describes the integration (the [`Partner`]), the
//! verification scripts the service should load and the elements it should
//! measure.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::ElementHandle;
use crate::validate::assert_truthy_string;

// ============================================================================
// Partner
// ============================================================================

/// Integration partner identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    name: String,
    version: String,
}

impl Partner {
    /// Creates a partner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `name` or `version` is blank.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let version = version.into();
        assert_truthy_string("Partner.name", &name)?;
        assert_truthy_string("Partner.version", &version)?;
        Ok(Self { name, version })
    }

    /// Returns the partner name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the partner integration version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

// ============================================================================
// VerificationScriptResource
// ============================================================================

/// A verification script the service should load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationScriptResource {
    resource_url: String,
    vendor_key: Option<String>,
    verification_parameters: Option<String>,
}

impl VerificationScriptResource {
    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `resource_url` is blank or not
    /// an absolute URL.
    pub fn new(
        resource_url: impl Into<String>,
        vendor_key: Option<String>,
        verification_parameters: Option<String>,
    ) -> Result<Self> {
        let resource_url = resource_url.into();
        assert_truthy_string("VerificationScriptResource.resourceUrl", &resource_url)?;
        Url::parse(&resource_url).map_err(|e| {
            Error::invalid_argument(format!(
                "Value for VerificationScriptResource.resourceUrl is not a valid URL: {e}"
            ))
        })?;

        Ok(Self {
            resource_url,
            vendor_key,
            verification_parameters,
        })
    }

    /// Returns the script URL.
    #[inline]
    #[must_use]
    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// Returns the vendor key.
    #[inline]
    #[must_use]
    pub fn vendor_key(&self) -> Option<&str> {
        self.vendor_key.as_deref()
    }

    /// Returns the opaque parameters handed to the script.
    #[inline]
    #[must_use]
    pub fn verification_parameters(&self) -> Option<&str> {
        self.verification_parameters.as_deref()
    }
}

// ============================================================================
// SessionContext
// ============================================================================

/// Everything a session reports to the service at construction.
#[derive(Debug, Clone)]
pub struct SessionContext {
    partner: Partner,
    verification_resources: Option<Vec<VerificationScriptResource>>,
    slot_element: Option<ElementHandle>,
    video_element: Option<ElementHandle>,
}

impl SessionContext {
    /// Creates a context for `partner`.
    #[must_use]
    pub fn new(partner: Partner) -> Self {
        Self {
            partner,
            verification_resources: None,
            slot_element: None,
            video_element: None,
        }
    }

    /// Sets the verification scripts to inject.
    #[inline]
    #[must_use]
    pub fn with_verification_resources(mut self, resources: Vec<VerificationScriptResource>) -> Self {
        self.verification_resources = Some(resources);
        self
    }

    /// Sets the element containing the ad.
    #[inline]
    #[must_use]
    pub fn with_slot_element(mut self, element: ElementHandle) -> Self {
        self.slot_element = Some(element);
        self
    }

    /// Sets the media element playing the ad.
    #[inline]
    #[must_use]
    pub fn with_video_element(mut self, element: ElementHandle) -> Self {
        self.video_element = Some(element);
        self
    }

    #[inline]
    #[must_use]
    pub fn partner(&self) -> &Partner {
        &self.partner
    }

    #[inline]
    #[must_use]
    pub fn verification_resources(&self) -> Option<&[VerificationScriptResource]> {
        self.verification_resources.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn slot_element(&self) -> Option<&ElementHandle> {
        self.slot_element.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn video_element(&self) -> Option<&ElementHandle> {
        self.video_element.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================
