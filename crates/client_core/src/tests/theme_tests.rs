use super::*;
use chrono::Utc;
use shared::domain::OrganizationId;

fn organization(base_color: Option<&str>) -> Organization {
    Organization {
        id: OrganizationId(1),
        name: "Corner Cafe".into(),
        slug: "corner-cafe".into(),
        base_color: base_color.map(str::to_string),
        logo_url: None,
        created_at: Utc::now(),
    }
}

#[test]
fn default_theme_without_tenant_color_has_no_bindings() {
    let controller = ThemeController::default();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.variant, ThemeVariant::Default);
    assert!(snapshot.palette.is_none());
    assert!(snapshot.custom_properties().is_empty());
    assert_eq!(snapshot.primary, "blue-600");
}

#[test]
fn tenant_color_derives_palette_and_bindings() {
    let controller = ThemeController::default();
    assert!(controller.apply_organization(&organization(Some("#6366f1"))));

    let snapshot = controller.snapshot();
    let palette = snapshot.palette.expect("palette");
    assert_eq!(palette.darker.to_string(), "#3b3ec9");
    assert_eq!(snapshot.primary, "#6366f1");
    assert_eq!(snapshot.secondary, "var(--primary-darker)");
    assert_eq!(
        snapshot.custom_properties(),
        vec![
            ("--primary-color", "#6366f1".to_string()),
            ("--primary-darker", "#3b3ec9".to_string()),
            ("--primary-slightly-darker", "#4f52dd".to_string()),
        ]
    );
}

#[test]
fn seasonal_variant_ignores_tenant_color() {
    let controller = ThemeController::new(ThemeVariant::Christmas);
    assert!(controller.update_base_color("#6366f1"));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.custom_base, Some(HexColor::new(0x63, 0x66, 0xf1)));
    assert!(snapshot.palette.is_none());
    assert!(snapshot.custom_properties().is_empty());
    assert_eq!(snapshot.primary, "red-600");
    assert!(snapshot.show_snow);

    controller.set_variant(ThemeVariant::Default);
    assert!(controller.snapshot().palette.is_some());
}

#[test]
fn color_without_hash_is_ignored() {
    let controller = ThemeController::default();
    assert!(controller.update_base_color("#112233"));
    assert!(!controller.update_base_color("6366f1"));
    assert!(!controller.update_base_color("#zzzzzz"));
    assert_eq!(
        controller.snapshot().custom_base,
        Some(HexColor::new(0x11, 0x22, 0x33))
    );
}

#[test]
fn organization_without_color_resets_palette() {
    let controller = ThemeController::default();
    controller.update_base_color("#112233");
    assert!(!controller.apply_organization(&organization(None)));
    assert!(controller.snapshot().palette.is_none());
}

#[test]
fn variant_names_round_trip() {
    for variant in ThemeVariant::ALL {
        assert_eq!(variant.as_str().parse::<ThemeVariant>(), Ok(variant));
    }
    assert_eq!("New-Year".parse::<ThemeVariant>(), Ok(ThemeVariant::NewYear));
    assert!("halloween".parse::<ThemeVariant>().is_err());
}

#[tokio::test]
async fn handles_observe_each_published_snapshot() {
    let controller = ThemeController::default();
    let mut handle = controller.handle();
    let before = handle.current();

    controller.update_base_color("#6366f1");
    let after = handle.changed().await.expect("controller alive");
    assert!(before.palette.is_none());
    assert!(after.palette.is_some());
    assert!(Arc::ptr_eq(&after, &handle.current()));

    // Re-applying the same color does not publish a new snapshot.
    controller.update_base_color("#6366f1");
    assert!(!handle.rx.has_changed().expect("controller alive"));

    drop(controller);
    assert!(handle.changed().await.is_none());
}
