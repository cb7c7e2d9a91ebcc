//! Organization and prize-tier loading for the active tenant.

use async_trait::async_trait;
use shared::protocol::{Organization, OrganizationUpdate, PrizeTier};
use tracing::{info, warn};

use crate::{gateway::GatewayError, theme::ThemeController};

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn my_organization(&self) -> Result<Organization, GatewayError>;
    async fn update_my_organization(
        &self,
        update: &OrganizationUpdate,
    ) -> Result<Organization, GatewayError>;
    async fn public_prize_tiers(&self, slug: &str) -> Result<Vec<PrizeTier>, GatewayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantContext {
    pub organization: Organization,
    /// Ascending by place.
    pub prize_tiers: Vec<PrizeTier>,
}

/// Fetches the operator's organization, pushes its color into `theme`, then
/// fetches its prize tiers.
pub async fn load_tenant(
    directory: &dyn TenantDirectory,
    theme: &ThemeController,
) -> Result<TenantContext, GatewayError> {
    let organization = directory.my_organization().await?;
    if !theme.apply_organization(&organization) && organization.base_color.is_some() {
        warn!(slug = %organization.slug, "organization color was not applied");
    }

    let mut prize_tiers = directory.public_prize_tiers(&organization.slug).await?;
    prize_tiers.sort_by_key(|tier| tier.place);
    info!(
        slug = %organization.slug,
        tiers = prize_tiers.len(),
        "tenant loaded"
    );

    Ok(TenantContext {
        organization,
        prize_tiers,
    })
}

/// Explicit admin save of the organization's branding.
pub async fn save_branding(
    directory: &dyn TenantDirectory,
    theme: &ThemeController,
    update: &OrganizationUpdate,
) -> Result<Organization, GatewayError> {
    let organization = directory.update_my_organization(update).await?;
    theme.apply_organization(&organization);
    info!(slug = %organization.slug, "organization branding saved");
    Ok(organization)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use shared::domain::{OrganizationId, PrizeTierId};

    use super::*;
    use crate::theme::ThemeVariant;

    struct StaticDirectory {
        organization: Mutex<Organization>,
        tiers: Vec<PrizeTier>,
        requested_slugs: Mutex<Vec<String>>,
    }

    impl StaticDirectory {
        fn new(base_color: Option<&str>, places: &[u32]) -> Self {
            Self {
                organization: Mutex::new(Organization {
                    id: OrganizationId(4),
                    name: "Harbor Bakery".into(),
                    slug: "harbor-bakery".into(),
                    base_color: base_color.map(str::to_string),
                    logo_url: None,
                    created_at: Utc::now(),
                }),
                tiers: places
                    .iter()
                    .enumerate()
                    .map(|(idx, place)| PrizeTier {
                        id: PrizeTierId(idx as i64 + 1),
                        place: *place,
                        name: format!("Prize {place}"),
                        description: None,
                        image_url: None,
                        link: None,
                        organization_id: OrganizationId(4),
                    })
                    .collect(),
                requested_slugs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TenantDirectory for StaticDirectory {
        async fn my_organization(&self) -> Result<Organization, GatewayError> {
            Ok(self.organization.lock().expect("lock").clone())
        }

        async fn update_my_organization(
            &self,
            update: &OrganizationUpdate,
        ) -> Result<Organization, GatewayError> {
            let mut organization = self.organization.lock().expect("lock");
            if let Some(color) = &update.base_color {
                organization.base_color = Some(color.clone());
            }
            if let Some(name) = &update.name {
                organization.name = name.clone();
            }
            Ok(organization.clone())
        }

        async fn public_prize_tiers(&self, slug: &str) -> Result<Vec<PrizeTier>, GatewayError> {
            self.requested_slugs
                .lock()
                .expect("lock")
                .push(slug.to_string());
            Ok(self.tiers.clone())
        }
    }

    #[tokio::test]
    async fn load_tenant_applies_color_and_sorts_tiers() {
        let directory = StaticDirectory::new(Some("#6366f1"), &[3, 1, 2]);
        let theme = ThemeController::default();

        let tenant = load_tenant(&directory, &theme).await.expect("tenant");

        let places = tenant
            .prize_tiers
            .iter()
            .map(|tier| tier.place)
            .collect::<Vec<_>>();
        assert_eq!(places, vec![1, 2, 3]);
        assert_eq!(
            *directory.requested_slugs.lock().expect("lock"),
            vec!["harbor-bakery".to_string()]
        );
        assert_eq!(
            theme.snapshot().palette.map(|p| p.darker.to_string()),
            Some("#3b3ec9".to_string())
        );
    }

    #[tokio::test]
    async fn load_tenant_under_seasonal_theme_keeps_seasonal_colors() {
        let directory = StaticDirectory::new(Some("#6366f1"), &[]);
        let theme = ThemeController::new(ThemeVariant::NewYear);

        let tenant = load_tenant(&directory, &theme).await.expect("tenant");

        assert!(tenant.prize_tiers.is_empty());
        assert!(theme.snapshot().palette.is_none());
        assert_eq!(theme.snapshot().primary, "purple-600");
    }

    #[tokio::test]
    async fn save_branding_republishes_theme() {
        let directory = StaticDirectory::new(None, &[]);
        let theme = ThemeController::default();
        let mut handle = theme.handle();

        let saved = save_branding(
            &directory,
            &theme,
            &OrganizationUpdate {
                base_color: Some("#224466".into()),
                ..OrganizationUpdate::default()
            },
        )
        .await
        .expect("save");

        assert_eq!(saved.base_color.as_deref(), Some("#224466"));
        let snapshot = handle.changed().await.expect("theme alive");
        assert_eq!(snapshot.primary, "#224466");
    }
}
