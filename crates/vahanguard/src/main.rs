//! `vguard` - CLI for vahanguard
//!
//! This binary registers vehicles, prints their emergency-access links and
//! drives emergency requests from both the requester's and the owner's side.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use vahanguard::access::{AccessForm, AccessView, EmergencyAccess};
use vahanguard::cli::{
    resolve_vehicle, AccountCommand, Cli, Command, ConfigCommand, CreateRequestArgs, OutputFormat,
    RequestCommand, VehicleCommand,
};
use vahanguard::model::{EmergencyRequest, NewEmergencyRequest, OwnerDetails, Vehicle};
use vahanguard::storage::{self, CollectionStore, SqliteStore};
use vahanguard::workflow::{Disclosure, ObservationSource, WatchConfig};
use vahanguard::{
    deep_link, init_logging, Account, Config, EmergencyWorkflow, IdentityStore, VehicleRegistry,
};

/// Services shared by every command.
#[derive(Debug)]
struct App {
    config: Config,
    store: Arc<dyn CollectionStore>,
    identity: IdentityStore,
    registry: Arc<VehicleRegistry>,
    workflow: Arc<EmergencyWorkflow>,
}

impl App {
    fn open(config: Config) -> anyhow::Result<Self> {
        let path = config.database_path();
        let store: Arc<dyn CollectionStore> = Arc::new(
            SqliteStore::open(&path)
                .with_context(|| format!("failed to open database at {}", path.display()))?,
        );
        let identity = IdentityStore::open(Arc::clone(&store), config.identity.secret_scheme)?;
        let registry = Arc::new(VehicleRegistry::open(Arc::clone(&store))?);
        let workflow = Arc::new(EmergencyWorkflow::open(
            Arc::clone(&store),
            registry.clone(),
        )?);

        Ok(Self {
            config,
            store,
            identity,
            registry,
            workflow,
        })
    }

    /// The signed-in account's vehicle, or an error if it belongs to someone else.
    fn owned_vehicle(&self, account: &Account, input: &str) -> anyhow::Result<Vehicle> {
        let vehicle = self.registry.require_vehicle(resolve_vehicle(input))?;
        if vehicle.user_id != account.id {
            bail!("vehicle {} is not registered to {}", vehicle.id, account.email);
        }
        Ok(vehicle)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    run(config, cli.command).await
}

async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    // Config commands work without a database
    match command {
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Account(cmd) => handle_account(&App::open(config)?, cmd),
        Command::Vehicle(cmd) => handle_vehicle(&App::open(config)?, cmd),
        Command::Request(cmd) => handle_request(&App::open(config)?, cmd).await,
        Command::Status(status_cmd) => handle_status(&App::open(config)?, status_cmd.json),
    }
}

fn handle_account(app: &App, cmd: AccountCommand) -> anyhow::Result<()> {
    match cmd {
        AccountCommand::Signup {
            name,
            email,
            password,
        } => {
            let account = app.identity.signup(&name, &email, &password)?;
            println!("Signed up and signed in as {} <{}>", account.name, account.email);
        }
        AccountCommand::Login { email, password } => {
            let account = app.identity.login(&email, &password)?;
            println!("Signed in as {} <{}>", account.name, account.email);
        }
        AccountCommand::Logout => {
            app.identity.logout()?;
            println!("Signed out.");
        }
        AccountCommand::Whoami { json } => match app.identity.current()? {
            Some(account) if json => {
                let value = serde_json::json!({
                    "id": account.id,
                    "name": account.name,
                    "email": account.email,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Some(account) => println!("{} <{}> ({})", account.name, account.email, account.id),
            None if json => println!("null"),
            None => println!("Not signed in."),
        },
    }
    Ok(())
}

fn handle_vehicle(app: &App, cmd: VehicleCommand) -> anyhow::Result<()> {
    let account = app
        .identity
        .require_current()
        .context("sign in with `vguard account login` first")?;

    match cmd {
        VehicleCommand::Add(args) => {
            let vehicle = app.registry.add_vehicle(&account, args.into())?;
            println!("Registered {} ({})", vehicle.registration_number, vehicle.id);
            println!(
                "Emergency access: {}",
                deep_link(&app.config.links.origin, &vehicle.id)
            );
        }
        VehicleCommand::List { format } => {
            let vehicles = app.registry.vehicles_for(&account.id)?;
            print_vehicles(&vehicles, format)?;
        }
        VehicleCommand::Show { vehicle, json } => {
            let vehicle = app.owned_vehicle(&account, &vehicle)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&vehicle)?);
            } else {
                println!("Vehicle {}", vehicle.id);
                print_details(&vehicle.owner_details());
            }
        }
        VehicleCommand::Link { vehicle } => {
            let vehicle = app.owned_vehicle(&account, &vehicle)?;
            println!("{}", deep_link(&app.config.links.origin, &vehicle.id));
        }
    }
    Ok(())
}

async fn handle_request(app: &App, cmd: RequestCommand) -> anyhow::Result<()> {
    match cmd {
        RequestCommand::Create(args) => {
            let vehicle = app.registry.require_vehicle(args.vehicle_id())?;
            let id = app.workflow.create(NewEmergencyRequest::new(
                vehicle.id,
                args.category.into(),
                args.image,
                args.description,
            ))?;
            println!("{id}");
        }
        RequestCommand::Watch(args) => watch_request(app, args).await?,
        RequestCommand::Status { id, json } => {
            let request = app
                .workflow
                .get_by_id(&id)?
                .with_context(|| format!("emergency request not found: {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&request)?);
            } else {
                println!("{}: {}", request.id, request.status);
            }
        }
        RequestCommand::List { vehicle, format } => {
            let account = app
                .identity
                .require_current()
                .context("sign in with `vguard account login` first")?;
            let vehicle = app.owned_vehicle(&account, &vehicle)?;
            let requests = app.workflow.requests_for_vehicle(&vehicle.id)?;
            print_requests(&requests, format)?;
        }
        RequestCommand::Approve { id } => {
            let request = app.workflow.approve(&id)?;
            println!("{}: {}", request.id, request.status);
        }
        RequestCommand::Reject { id } => {
            let request = app.workflow.reject(&id)?;
            println!("{}: {}", request.id, request.status);
        }
        RequestCommand::Disclose { id, json } => {
            let disclosure = app.workflow.disclose(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&disclosure)?);
            } else {
                match disclosure {
                    Disclosure::Approved(details) => print_details(&details),
                    Disclosure::Pending => println!("Request {id} is still pending."),
                    Disclosure::Rejected => println!("Request {id} was rejected."),
                    Disclosure::VehicleMissing => {
                        println!("Request {id} was approved but its vehicle no longer exists.");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn watch_request(app: &App, args: CreateRequestArgs) -> anyhow::Result<()> {
    let mut watch = WatchConfig::from(&app.config);
    if args.no_fallback {
        watch.auto_approve_after = None;
    }

    let mut page = EmergencyAccess::open(
        app.registry.as_ref(),
        Arc::clone(&app.workflow),
        args.vehicle_id(),
        watch,
    )?;
    let id = page.submit(AccessForm {
        category: args.category.into(),
        image_ref: args.image,
        description: args.description,
    })?;
    println!("Request {id} sent to the owner of {}.", page.vehicle().registration_number);

    while let Some(observation) = page.next_observation().await {
        println!("  status: {}", observation.status);
        if observation.is_terminal() {
            break;
        }
    }

    match page.view()? {
        AccessView::Approved {
            details, source, ..
        } => {
            if source == ObservationSource::LocalFallback {
                println!("Shown as approved locally; the stored request is still pending.");
            }
            print_details(&details);
        }
        AccessView::Rejected { .. } => {
            println!("The owner declined. Run the command again to try again.");
        }
        AccessView::Pending { .. } | AccessView::Form => {
            println!("Stopped watching before the request was resolved.");
        }
    }
    Ok(())
}

fn handle_status(app: &App, json: bool) -> anyhow::Result<()> {
    let stats = storage::stats(app.store.as_ref())?;
    let database = app.config.database_path();

    if json {
        let status = serde_json::json!({
            "database_path": database,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("vguard status");
        println!("-------------");
        println!("Database:         {}", database.display());
        println!("Accounts:         {}", stats.accounts);
        println!("Vehicles:         {}", stats.vehicles);
        println!(
            "Requests:         {} ({} pending)",
            stats.requests, stats.pending_requests
        );
        println!(
            "Session:          {}",
            if stats.signed_in { "signed in" } else { "signed out" }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Workflow]");
                println!("  Poll interval (ms): {}", config.workflow.poll_interval_ms);
                println!("  Auto-approve:       {}", config.workflow.auto_approve_enabled);
                println!(
                    "  Auto-approve (ms):  {}",
                    config.workflow.auto_approve_delay_ms
                );
                println!();
                println!("[Links]");
                println!("  Origin:             {}", config.links.origin);
                println!();
                println!("[Identity]");
                println!("  Secret scheme:      {}", config.identity.secret_scheme);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_details(details: &OwnerDetails) {
    println!("  Registration:      {}", details.registration_number);
    println!("  Model:             {}", details.model);
    println!("  Color:             {}", details.color);
    println!("  Owner:             {}", details.owner_name);
    println!("  Contact:           {}", details.owner_contact);
    if let Some(contact) = &details.emergency_contact {
        println!("  Emergency contact: {contact}");
    }
    if let Some(address) = &details.owner_address {
        println!("  Address:           {address}");
    }
}

fn print_vehicles(vehicles: &[Vehicle], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(vehicles)?),
        OutputFormat::Plain => {
            for vehicle in vehicles {
                println!("{} {}", vehicle.id, vehicle.registration_number);
            }
        }
        OutputFormat::Table => {
            if vehicles.is_empty() {
                println!("No vehicles registered.");
                return Ok(());
            }
            println!("{:<38} {:<16} {:<16} {}", "ID", "REGISTRATION", "MODEL", "COLOR");
            for vehicle in vehicles {
                println!(
                    "{:<38} {:<16} {:<16} {}",
                    vehicle.id, vehicle.registration_number, vehicle.model, vehicle.color
                );
            }
        }
    }
    Ok(())
}

fn print_requests(requests: &[EmergencyRequest], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(requests)?),
        OutputFormat::Plain => {
            for request in requests {
                println!("{} {}", request.id, request.status);
            }
        }
        OutputFormat::Table => {
            if requests.is_empty() {
                println!("No emergency requests.");
                return Ok(());
            }
            println!(
                "{:<38} {:<10} {:<10} {:<20} {}",
                "ID", "STATUS", "CATEGORY", "RAISED", "DESCRIPTION"
            );
            for request in requests {
                println!(
                    "{:<38} {:<10} {:<10} {:<20} {}",
                    request.id,
                    request.status.to_string(),
                    request.request_type.to_string(),
                    request.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    request.description
                );
            }
        }
    }
    Ok(())
}
