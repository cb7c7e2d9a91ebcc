//! Client core for the feedback prize draw: palette derivation, theme state,
//! the remote draw gateway and the draw workflow that drives it.

pub mod dialog;
pub mod gateway;
pub mod http;
pub mod orchestrator;
pub mod palette;
pub mod tenant;
pub mod theme;

pub use dialog::{tier_choices, ConfirmationDialog, DialogError, Resolution, TierChoice};
pub use gateway::{DrawGateway, GatewayError, NotificationReceipt};
pub use http::{ClientSettings, ClientSetupError, DrawApiClient};
pub use orchestrator::{
    ConfirmOutcome, DeliveryOutcome, DrawEvent, DrawFailure, DrawOrchestrator, DrawPhase,
    DrawSnapshot, PendingWinner, PhaseKind, RetryHint, Settlement, SpinOutcome, SpinTiming,
};
pub use palette::{HexColor, HexColorError, Palette};
pub use tenant::{load_tenant, save_branding, TenantContext, TenantDirectory};
pub use theme::{ThemeController, ThemeHandle, ThemeSnapshot, ThemeVariant};
