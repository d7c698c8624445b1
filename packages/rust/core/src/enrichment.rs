//! CRM enrichment seam. Profiles get their volatile CRM fields attached
//! here on every run; those fields never reach the cache.

use async_trait::async_trait;

use prospector_shared::{PersonProfile, Result};

/// Attaches CRM state (status, last contact, interaction log) to person
/// profiles. Implementations live outside the pipeline so a run works
/// the same with or without a CRM configured.
#[async_trait]
pub trait CrmEnricher: Send + Sync {
    /// False skips enrichment entirely for the run.
    fn is_configured(&self) -> bool;

    /// Fill `crm_status`, `last_contacted`, and `interactions` in place.
    /// May also supply a title when web research found none.
    async fn enrich(&self, company_name: &str, profile: &mut PersonProfile) -> Result<()>;
}

/// Default enricher when no CRM is configured.
pub struct NoCrm;

#[async_trait]
impl CrmEnricher for NoCrm {
    fn is_configured(&self) -> bool {
        false
    }

    async fn enrich(&self, _company_name: &str, _profile: &mut PersonProfile) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_crm_leaves_profile_untouched() {
        let mut profile = PersonProfile::named("Jane Doe");
        NoCrm.enrich("Ridge Capital", &mut profile).await.expect("enrich");
        assert!(profile.crm_status.is_none());
        assert!(profile.interactions.is_empty());
        assert!(!NoCrm.is_configured());
    }
}
