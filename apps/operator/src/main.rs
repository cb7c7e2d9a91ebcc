mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_tenant, palette, save_branding, ConfirmOutcome, DrawApiClient, DrawEvent, DrawFailure,
    DrawGateway, DrawOrchestrator, HexColor, Palette, RetryHint, SpinOutcome, SpinTiming,
    ThemeController, ThemeSnapshot, ThemeVariant,
};
use config::{load_settings, Settings};
use shared::{
    domain::{ordinal, EntrantId, PrizeTierId},
    protocol::{
        Entrant, EntrantCreate, EntrantUpdate, OrganizationUpdate, PrizeTierDraft, PrizeTierPatch,
    },
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Operator console for the feedback prize draw")]
struct Cli {
    #[arg(long, default_value = "operator.toml")]
    config: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Overrides {
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long = "org")]
    organization_slug: Option<String>,
    #[arg(long = "email")]
    admin_email: Option<String>,
    #[arg(long)]
    spin_duration_ms: Option<u64>,
    #[arg(long)]
    theme: Option<ThemeVariant>,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = self.organization_slug {
            settings.organization_slug = Some(v);
        }
        if let Some(v) = self.admin_email {
            settings.admin_email = Some(v);
        }
        if let Some(v) = self.spin_duration_ms {
            settings.spin_duration_ms = v;
        }
        if let Some(v) = self.theme {
            settings.theme = v;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Spin the wheel and settle one winner.
    Draw {
        /// Prize place to award; defaults to the first configured tier.
        #[arg(long)]
        place: Option<u32>,
        /// Record the win and queue the notification instead of sending it now.
        #[arg(long)]
        later: bool,
        /// Re-send once if the notification fails after the win was recorded.
        #[arg(long)]
        retry_notify: bool,
    },
    Entrants {
        #[command(subcommand)]
        action: EntrantAction,
    },
    /// Submit feedback through the public form endpoint.
    Submit {
        name: String,
        email: String,
        feedback: String,
    },
    Prizes {
        #[command(subcommand)]
        action: PrizeAction,
    },
    Branding {
        #[command(subcommand)]
        action: BrandingAction,
    },
    /// Derive the palette for a base color without contacting the service.
    Palette { hex: String },
}

#[derive(Subcommand, Debug)]
enum EntrantAction {
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    Show {
        id: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        feedback: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum PrizeAction {
    List,
    Add {
        place: u32,
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        link: Option<String>,
    },
    Update {
        id: i64,
        #[arg(long)]
        place: Option<u32>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        link: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum BrandingAction {
    Show,
    SetColor { hex: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    cli.overrides.apply(&mut settings);

    if let Command::Palette { hex } = &cli.command {
        let palette = palette::derive(hex).with_context(|| format!("invalid color {hex:?}"))?;
        print_palette(&palette);
        return Ok(());
    }

    let client = Arc::new(DrawApiClient::new(&settings.client_settings())?);
    info!(api = client.base_url(), "operator console ready");

    match cli.command {
        Command::Draw {
            place,
            later,
            retry_notify,
        } => {
            login(&client, &settings).await?;
            run_draw(Arc::clone(&client), &settings, place, !later, retry_notify).await?;
            client.logout().await;
        }
        Command::Entrants { action } => {
            login(&client, &settings).await?;
            run_entrants(&client, action).await?;
            client.logout().await;
        }
        Command::Submit {
            name,
            email,
            feedback,
        } => {
            let organization_slug = settings
                .organization_slug
                .clone()
                .ok_or_else(|| anyhow!("an organization slug is required (--org)"))?;
            let theme = ThemeController::new(settings.theme);
            let organization = client.public_organization(&organization_slug).await?;
            theme.apply_organization(&organization);
            println!("leaving feedback for {}", organization.name);
            print_theme(&theme.snapshot());

            let entrant = client
                .submit_feedback(&EntrantCreate {
                    name,
                    email,
                    feedback,
                    organization_slug,
                })
                .await?;
            println!("thank you, {}! feedback #{} recorded", entrant.name, entrant.id);
        }
        Command::Prizes { action } => {
            login(&client, &settings).await?;
            run_prizes(&client, action).await?;
            client.logout().await;
        }
        Command::Branding { action } => {
            login(&client, &settings).await?;
            let theme = ThemeController::new(settings.theme);
            match action {
                BrandingAction::Show => {
                    let tenant = load_tenant(client.as_ref(), &theme).await?;
                    println!(
                        "{} ({})",
                        tenant.organization.name, tenant.organization.slug
                    );
                }
                BrandingAction::SetColor { hex } => {
                    HexColor::parse_prefixed(&hex)
                        .with_context(|| format!("invalid color {hex:?}"))?;
                    let organization = save_branding(
                        client.as_ref(),
                        &theme,
                        &OrganizationUpdate {
                            base_color: Some(hex),
                            ..OrganizationUpdate::default()
                        },
                    )
                    .await?;
                    println!("saved branding for {}", organization.slug);
                }
            }
            print_theme(&theme.snapshot());
            client.logout().await;
        }
        Command::Palette { .. } => {}
    }

    Ok(())
}

async fn login(client: &DrawApiClient, settings: &Settings) -> Result<()> {
    let (Some(email), Some(password)) = (&settings.admin_email, &settings.admin_password) else {
        bail!("admin credentials required: set --email (or ADMIN_EMAIL) and ADMIN_PASSWORD");
    };
    client.login(email, password).await?;
    Ok(())
}

async fn run_draw(
    client: Arc<DrawApiClient>,
    settings: &Settings,
    place: Option<u32>,
    send_now: bool,
    retry_notify: bool,
) -> Result<()> {
    let theme = ThemeController::new(settings.theme);
    let tenant = load_tenant(client.as_ref(), &theme).await?;

    let gateway: Arc<dyn DrawGateway> = client.clone();
    let draw = DrawOrchestrator::with_timing(
        gateway,
        SpinTiming::with_duration(settings.spin_duration()),
    );
    draw.set_prize_tiers(&tenant.prize_tiers).await;

    let mut events = draw.subscribe();
    let refresh_client = Arc::clone(&client);
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DrawEvent::PhaseChanged(phase) => info!(%phase, "draw phase"),
                DrawEvent::Failed(failure) => warn!(%failure, "draw failed"),
                DrawEvent::Settled(_) => {
                    match refresh_client.list_entrants(0, 100).await {
                        Ok(page) => {
                            let winners = page.entrants.iter().filter(|e| e.is_winner).count();
                            info!(total = page.total, winners, "entrant listing refreshed");
                        }
                        Err(err) => warn!(%err, "failed to refresh entrant listing"),
                    }
                    break;
                }
            }
        }
    });

    println!("{} spinning...", theme.snapshot().main_emoji);
    let pending = match draw.spin().await {
        SpinOutcome::Drawn(pending) => pending,
        SpinOutcome::Failed(failure) => return Err(report_failure(failure)),
        SpinOutcome::Ignored(phase) => bail!("draw already in progress ({phase})"),
    };
    println!(
        "winner: {} <{}>\n  \"{}\"",
        pending.entrant.name, pending.entrant.email, pending.entrant.feedback
    );

    let snapshot = draw.snapshot().await;
    let default_place = match snapshot.dialog() {
        Some(dialog) => {
            for choice in dialog.choices() {
                match &choice.prize_name {
                    Some(prize) => println!("  [{}] {} - {prize}", choice.place, choice.label),
                    None => println!("  [{}] {}", choice.place, choice.label),
                }
            }
            dialog.selected_place()
        }
        None => 1,
    };

    let mut outcome = draw
        .confirm(place.unwrap_or(default_place), send_now)
        .await;
    if retry_notify {
        if let ConfirmOutcome::Failed(failure) = &outcome {
            if failure.winner_recorded() {
                warn!(%failure, "re-sending notification");
                outcome = draw.retry_notification(send_now).await;
            }
        }
    }

    let result = match outcome {
        ConfirmOutcome::Settled(settlement) => {
            println!("{} ({} place)", settlement.summary(), ordinal(settlement.place));
            Ok(())
        }
        ConfirmOutcome::Failed(failure) => Err(report_failure(failure)),
        ConfirmOutcome::Rejected(err) => Err(anyhow!(err)),
        ConfirmOutcome::Ignored(phase) => Err(anyhow!("confirmation ignored in phase {phase}")),
    };

    drop(draw);
    let _ = listener.await;
    result
}

fn report_failure(failure: DrawFailure) -> anyhow::Error {
    let hint = match failure.retry_hint() {
        RetryHint::WaitForEntrants => "wait for new feedback before drawing again",
        RetryHint::SpinAgain => "run `draw` again",
        RetryHint::ResendNotification => {
            "the win is recorded; re-send the notification only, do not draw again"
        }
    };
    eprintln!("hint: {hint}");
    anyhow!(failure)
}

async fn run_entrants(client: &DrawApiClient, action: EntrantAction) -> Result<()> {
    match action {
        EntrantAction::List { skip, limit } => {
            let page = client.list_entrants(skip, limit).await?;
            println!("{} entrants (showing {})", page.total, page.entrants.len());
            for entrant in &page.entrants {
                print_entrant(entrant);
            }
        }
        EntrantAction::Show { id } => {
            let entrant = client.get_entrant(EntrantId(id)).await?;
            print_entrant(&entrant);
            println!("  \"{}\"", entrant.feedback);
        }
        EntrantAction::Edit {
            id,
            name,
            email,
            feedback,
        } => {
            let entrant = client
                .update_entrant(
                    EntrantId(id),
                    &EntrantUpdate {
                        name,
                        email,
                        feedback,
                        ..EntrantUpdate::default()
                    },
                )
                .await?;
            print_entrant(&entrant);
        }
        EntrantAction::Remove { id } => {
            client.delete_entrant(EntrantId(id)).await?;
            println!("removed entrant #{id}");
        }
    }
    Ok(())
}

async fn run_prizes(client: &DrawApiClient, action: PrizeAction) -> Result<()> {
    match action {
        PrizeAction::List => {
            let mut tiers = client.my_prize_tiers().await?;
            tiers.sort_by_key(|tier| tier.place);
            for tier in &tiers {
                println!("#{} {} Place: {}", tier.id, ordinal(tier.place), tier.name);
            }
        }
        PrizeAction::Add {
            place,
            name,
            description,
            image_url,
            link,
        } => {
            let tier = client
                .create_prize_tier(&PrizeTierDraft {
                    place,
                    name,
                    description,
                    image_url,
                    link,
                })
                .await?;
            println!("created prize #{} for {} place", tier.id, ordinal(tier.place));
        }
        PrizeAction::Update {
            id,
            place,
            name,
            description,
            image_url,
            link,
        } => {
            let tier = client
                .update_prize_tier(
                    PrizeTierId(id),
                    &PrizeTierPatch {
                        place,
                        name,
                        description,
                        image_url,
                        link,
                    },
                )
                .await?;
            println!("updated prize #{}: {}", tier.id, tier.name);
        }
        PrizeAction::Remove { id } => {
            client.delete_prize_tier(PrizeTierId(id)).await?;
            println!("removed prize #{id}");
        }
    }
    Ok(())
}

fn print_entrant(entrant: &Entrant) {
    let status = match (entrant.winner_place, entrant.is_notified) {
        (Some(place), true) => format!("{} place, notified", ordinal(place)),
        (Some(place), false) => format!("{} place, not notified", ordinal(place)),
        (None, _) => "entrant".to_string(),
    };
    let EntrantId(id) = entrant.id;
    println!("{id:>5}  {:<24} {:<32} {status}", entrant.name, entrant.email);
}

fn print_palette(palette: &Palette) {
    println!("base             {}", palette.base);
    println!("darker           {}", palette.darker);
    println!("slightly darker  {}", palette.slightly_darker);
}

fn print_theme(snapshot: &ThemeSnapshot) {
    println!("theme {} {}", snapshot.variant, snapshot.main_emoji);
    let properties = snapshot.custom_properties();
    if properties.is_empty() {
        println!("  no custom color (preset primary {})", snapshot.primary);
    }
    for (name, value) in properties {
        println!("  {name}: {value}");
    }
}
