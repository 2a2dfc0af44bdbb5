use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tripbook::api::{ApiOptions, HttpTripApi, TripApi, DEFAULT_API_URL};
use tripbook::error::BookingError;
use tripbook::flow::{BookingFlow, FlowOptions, FlowState, Submission};
use tripbook::invoice::{self, BookingData, Delivery};
use tripbook::model::{BookingDetails, Trip};
use tripbook::passenger::PassengerField;
use tripbook::prompt::{Notice, Prompter, TerminalPrompter};
use tripbook::query::TripQuery;
use tripbook::recovery::{Recovery, RecoveryCoordinator};
use tripbook::storage::{
    DraftBookingStore, FileStore, SearchParams, SessionTokenStore, SharedStore,
};
use tripbook::table;

#[derive(Parser)]
#[command(
    name = "tripbook",
    about = "Search trips, pick seats, book and pay from the terminal",
    version,
    after_help = "\
Examples:
  tripbook search -f Siwa -t Cairo -d 2026-11-01
  tripbook book -f Siwa -t Cairo -d 2026-11-01 --index 1 --seat 3B \\
      --name \"Mona Adel\" --email mona@example.com --phone +201012345678 \\
      --passenger \"Mona Adel:A1234567\"
  tripbook login --token <TOKEN>
  tripbook resume"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalArgs {
    #[arg(
        long,
        global = true,
        env = "TRIPBOOK_API_URL",
        default_value = DEFAULT_API_URL,
        value_name = "URL",
        help = "Trip API base URL"
    )]
    api_url: String,

    #[arg(
        long,
        global = true,
        env = "TRIPBOOK_STORE",
        value_name = "PATH",
        help = "Local storage file holding the session token and draft booking"
    )]
    store: Option<PathBuf>,

    #[arg(long, global = true, value_name = "URL", help = "HTTP or SOCKS5 proxy")]
    proxy: Option<String>,

    #[arg(long, global = true, default_value = "30", value_name = "SECS", help = "Request timeout")]
    timeout: u64,

    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,

    #[arg(short, long, global = true, help = "Verbose logging (or set TRIPBOOK_LOG)")]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(about = "Search for trips")]
    Search(SearchArgs),
    #[command(
        about = "Book seats on a trip",
        long_about = "Search, pick a trip, select seats and enter passenger details, then book.\n\
            Without a session token the booking is saved as a draft; sign in with \
            `tripbook login` and continue with `tripbook resume`."
    )]
    Book(BookArgs),
    #[command(about = "Continue a booking interrupted by sign-in")]
    Resume(PaymentArgs),
    #[command(about = "Store a session token")]
    Login {
        #[arg(long, value_name = "TOKEN", help = "Bearer token issued by the sign-in page")]
        token: String,
    },
    #[command(about = "Forget the session token")]
    Logout,
    #[command(about = "Inspect or clear the draft booking")]
    Draft {
        #[command(subcommand)]
        command: DraftCommand,
    },
    #[command(about = "Generate a PDF invoice from booking data (JSON)")]
    Invoice {
        #[arg(long, value_name = "FILE", help = "BookingData JSON file")]
        input: PathBuf,
        #[arg(long, default_value = ".", value_name = "DIR", help = "Directory to write the PDF to")]
        output: PathBuf,
        #[arg(long, help = "Open the invoice in the system viewer")]
        open: bool,
    },
}

#[derive(clap::Subcommand)]
enum DraftCommand {
    #[command(about = "Print the draft booking")]
    Show,
    #[command(about = "Discard the draft booking")]
    Clear,
}

#[derive(clap::Args)]
struct TripSelect {
    #[arg(short, long, value_name = "PLACE", help = "Origin")]
    from: String,

    #[arg(short, long, value_name = "PLACE", help = "Destination")]
    to: String,

    #[arg(short, long, value_name = "YYYY-MM-DD", help = "First departure day")]
    date: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Last departure day (defaults to --date)")]
    until: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD", help = "First arrival day")]
    arrive: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Last arrival day (defaults to --arrive)")]
    arrive_until: Option<String>,

    #[arg(long, default_value = "0", value_name = "N", help = "Result offset")]
    offset: u32,
}

#[derive(clap::Args)]
struct SearchArgs {
    #[command(flatten)]
    select: TripSelect,

    #[arg(long, help = "One line per trip")]
    compact: bool,

    #[arg(long, help = "Output as pretty-printed JSON")]
    pretty: bool,
}

#[derive(clap::Args)]
struct PaymentArgs {
    #[arg(long, help = "Print the payment URL instead of opening it")]
    no_open: bool,

    #[arg(long, value_name = "DIR", help = "Write a PDF invoice here once paid")]
    invoice_dir: Option<PathBuf>,
}

#[derive(clap::Args)]
struct BookArgs {
    #[command(flatten)]
    select: TripSelect,

    #[arg(long, value_name = "ID", help = "Trip to book")]
    trip_id: Option<String>,

    #[arg(long, value_name = "N", help = "Trip to book, by result position (1-based)")]
    index: Option<usize>,

    #[arg(long, default_value = "1", value_name = "N", help = "Adult passengers (one seat each)")]
    adults: u32,

    #[arg(long, default_value = "0", value_name = "N", help = "Infants (share an adult's seat)")]
    infants: u32,

    #[arg(long, value_name = "SEAT", num_args = 1, help = "Seat label or id (repeatable)")]
    seat: Vec<String>,

    #[arg(long, value_name = "NAME", help = "Booker name")]
    name: String,

    #[arg(long, value_name = "EMAIL", help = "Booker email")]
    email: String,

    #[arg(long, value_name = "+20XXXXXXXXXX", help = "Booker phone")]
    phone: String,

    #[arg(
        long,
        value_name = "\"NAME:ID\"",
        num_args = 1,
        help = "Adult passenger name and passport/ID number (repeatable, in seat order)"
    )]
    passenger: Vec<String>,

    #[arg(
        long,
        value_name = "PATH",
        num_args = 1,
        help = "Passport scan for the passenger at the same position (repeatable)"
    )]
    document: Vec<PathBuf>,

    #[command(flatten)]
    payment: PaymentArgs,
}

fn error_code(err: &BookingError) -> i32 {
    match err {
        BookingError::Validation(_)
        | BookingError::InvalidPhone(_)
        | BookingError::InvalidDate(_) => 2,
        BookingError::Timeout
        | BookingError::ConnectionFailed(_)
        | BookingError::DnsResolution(_)
        | BookingError::TlsError(_)
        | BookingError::ProxyError(_) => 3,
        BookingError::Unauthorized => 4,
        BookingError::SearchFailed(_)
        | BookingError::BookingFailed(_)
        | BookingError::PaymentIntentFailed(_)
        | BookingError::CancelFailed(_) => 5,
        BookingError::InvalidResponse(_) => 6,
        BookingError::InvalidState(_) => 7,
        BookingError::Storage(_) => 8,
        BookingError::Invoice(_) => 9,
        BookingError::Io(_) => 10,
        BookingError::NoResults => 0,
    }
}

fn error_kind(err: &BookingError) -> &'static str {
    match err {
        BookingError::Validation(_) => "validation_error",
        BookingError::InvalidPhone(_) => "invalid_phone",
        BookingError::InvalidDate(_) => "invalid_date",
        BookingError::Timeout => "timeout",
        BookingError::ConnectionFailed(_) => "connection_failed",
        BookingError::DnsResolution(_) => "dns_error",
        BookingError::TlsError(_) => "tls_error",
        BookingError::ProxyError(_) => "proxy_error",
        BookingError::Unauthorized => "unauthorized",
        BookingError::SearchFailed(_) => "search_failed",
        BookingError::BookingFailed(_) => "booking_failed",
        BookingError::PaymentIntentFailed(_) => "payment_intent_failed",
        BookingError::CancelFailed(_) => "cancel_failed",
        BookingError::InvalidResponse(_) => "invalid_response",
        BookingError::InvalidState(_) => "invalid_state",
        BookingError::Storage(_) => "storage_error",
        BookingError::Invoice(_) => "invoice_error",
        BookingError::Io(_) => "io_error",
        BookingError::NoResults => "no_results",
    }
}

fn die(err: &BookingError, json_mode: bool) -> ! {
    if json_mode {
        let json = serde_json::json!({
            "error": {
                "kind": error_kind(err),
                "message": err.to_string(),
            }
        });
        println!("{json}");
    } else {
        eprintln!("error: {err}");
    }
    process::exit(error_code(err));
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "tripbook=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("TRIPBOOK_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

struct Context {
    global: GlobalArgs,
    store: SharedStore,
}

impl Context {
    fn new(global: GlobalArgs) -> Self {
        let path = global.store.clone().unwrap_or_else(FileStore::default_path);
        Self {
            global,
            store: Arc::new(FileStore::new(path)),
        }
    }

    fn api(&self) -> Result<Arc<dyn TripApi>, BookingError> {
        let options = ApiOptions {
            base_url: self.global.api_url.clone(),
            proxy: self.global.proxy.clone(),
            timeout: self.global.timeout,
        };
        Ok(Arc::new(HttpTripApi::new(&options)?))
    }

    fn tokens(&self) -> SessionTokenStore {
        SessionTokenStore::new(Arc::clone(&self.store))
    }

    fn drafts(&self) -> DraftBookingStore {
        DraftBookingStore::new(Arc::clone(&self.store))
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => die(&BookingError::Validation(e.to_string()), true),
        }
    }
}

fn build_query(select: &TripSelect) -> Result<TripQuery, BookingError> {
    let mut query = TripQuery::new(select.from.trim(), select.to.trim());
    if let Some(ref date) = select.date {
        query = query.with_departure_days(date, select.until.as_deref())?;
    } else if select.until.is_some() {
        return Err(BookingError::Validation("--until requires --date".into()));
    }
    if let Some(ref day) = select.arrive {
        query = query.with_arrival_days(day, select.arrive_until.as_deref())?;
    } else if select.arrive_until.is_some() {
        return Err(BookingError::Validation("--arrive-until requires --arrive".into()));
    }
    query.offset = select.offset;
    query.validate()?;
    Ok(query)
}

fn pick_trip(trips: &[Trip], trip_id: Option<&str>, index: Option<usize>) -> Result<Trip, BookingError> {
    if let Some(id) = trip_id {
        return trips
            .iter()
            .find(|t| t.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| BookingError::Validation(format!("no trip with id \"{id}\" in the results")));
    }
    if let Some(n) = index {
        return n
            .checked_sub(1)
            .and_then(|i| trips.get(i))
            .cloned()
            .ok_or_else(|| {
                BookingError::Validation(format!("--index must be between 1 and {}", trips.len()))
            });
    }
    match trips {
        [only] => Ok(only.clone()),
        _ => {
            eprintln!("{}", table::render(trips));
            Err(BookingError::Validation(format!(
                "{} trips match, pick one with --trip-id or --index",
                trips.len()
            )))
        }
    }
}

fn read_choice(question: &str) -> Option<String> {
    eprint!("{question} ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}

fn print_confirmation(details: &BookingDetails, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::json!({ "confirmed": details }));
        return;
    }
    println!("Payment successful! Your trip has been booked.");
    println!("  Booking:    {}", details.booking_id);
    println!("  Route:      {} → {}", details.from, details.to);
    println!("  Price:      {}", details.price);
    println!("  Seats:      {}", details.selected_seats.join(", "));
    println!("  Passengers: {}", details.passengers.len());
    println!("  Booked by:  {}", details.booker_name);
    println!("Confirmation email sent to {}", details.booker_email);
}

async fn wait_for(handle: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "cancellation task failed");
        }
    }
}

enum PaymentStep {
    Done,
    BackToForm,
}

async fn payment_step(
    flow: &mut BookingFlow,
    url: &str,
    args: &PaymentArgs,
    json_mode: bool,
) -> Result<PaymentStep, BookingError> {
    if json_mode {
        println!(
            "{}",
            serde_json::json!({ "bookingId": flow.current_booking_id(), "paymentUrl": url })
        );
    } else {
        println!("Complete your payment at: {url}");
    }
    if !args.no_open {
        if let Err(e) = open::that(url) {
            warn!(error = %e, "cannot open payment page");
        }
    }

    let prompter = TerminalPrompter;
    loop {
        let choice = read_choice("Payment: [c]ompleted, [b]ack to booking, [q]uit?");
        match choice.as_deref() {
            Some("c") | Some("completed") => {
                let details = flow.complete_payment()?;
                print_confirmation(&details, json_mode);
                if let Some(ref dir) = args.invoice_dir {
                    write_invoice(&BookingData::from(&details), dir, !args.no_open)?;
                }
                flow.close();
                return Ok(PaymentStep::Done);
            }
            Some("b") | Some("back") => {
                if flow.go_back(&prompter).await? {
                    prompter.notify(Notice::Info, "Booking cancelled, back at the booking form.");
                    return Ok(PaymentStep::BackToForm);
                }
            }
            Some("q") | Some("quit") | None => {
                wait_for(flow.close()).await;
                prompter.notify(Notice::Info, "Booking closed and cancelled.");
                return Ok(PaymentStep::Done);
            }
            Some(_) => {}
        }
    }
}

async fn drive(flow: &mut BookingFlow, args: &PaymentArgs, json_mode: bool) -> Result<(), BookingError> {
    let prompter = TerminalPrompter;
    loop {
        let submission = match flow.submit().await {
            Ok(submission) => submission,
            Err(e) => {
                if matches!(flow.state(), FlowState::AwaitingPayment { .. }) {
                    wait_for(flow.close()).await;
                }
                return Err(e);
            }
        };

        match submission {
            Submission::SignInRequired { sign_in_url } => {
                if json_mode {
                    println!("{}", serde_json::json!({ "signInRequired": sign_in_url }));
                } else {
                    println!("Sign-in required ({sign_in_url}). Your booking has been saved.");
                    println!("Sign in, then run `tripbook login --token <TOKEN>` and `tripbook resume`.");
                }
                return Ok(());
            }
            Submission::Booked { booking_id } => {
                if json_mode {
                    println!("{}", serde_json::json!({ "booked": booking_id }));
                } else {
                    println!("Booking {booking_id} created successfully!");
                }
                return Ok(());
            }
            Submission::AwaitingPayment { redirect_url, .. } => {
                match payment_step(flow, &redirect_url, args, json_mode).await? {
                    PaymentStep::Done => return Ok(()),
                    PaymentStep::BackToForm => {
                        if !prompter.confirm("Submit the booking again?") {
                            flow.close();
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn write_invoice(data: &BookingData, dir: &Path, open_viewer: bool) -> Result<(), BookingError> {
    match invoice::deliver(data, dir, open_viewer)? {
        Delivery::Opened(path) => eprintln!("Invoice opened: {}", path.display()),
        Delivery::Saved(path) => eprintln!("Invoice saved: {}", path.display()),
    }
    Ok(())
}

fn parse_passenger(spec: &str) -> Result<(String, String), BookingError> {
    spec.rsplit_once(':')
        .map(|(name, id)| (name.trim().to_string(), id.trim().to_string()))
        .filter(|(name, id)| !name.is_empty() && !id.is_empty())
        .ok_or_else(|| {
            BookingError::Validation(format!("--passenger must be \"NAME:ID\", got: \"{spec}\""))
        })
}

async fn run_search(ctx: &Context, args: &SearchArgs) -> Result<(), BookingError> {
    let query = build_query(&args.select)?;
    let api = ctx.api()?;
    let trips = tripbook::search(api.as_ref(), &query).await?;

    if args.pretty || ctx.global.json {
        let text = if args.pretty {
            serde_json::to_string_pretty(&trips)
        } else {
            serde_json::to_string(&trips)
        }
        .map_err(|e| BookingError::Validation(e.to_string()))?;
        println!("{text}");
    } else if trips.is_empty() {
        println!("No trips found.");
    } else if args.compact {
        for trip in &trips {
            println!("{}", table::compact_line(trip));
        }
    } else {
        println!("{}", table::render(&trips));
    }

    RecoveryCoordinator::new(api, Arc::clone(&ctx.store)).check_stale_draft(&trips, &TerminalPrompter);
    Ok(())
}

async fn run_book(ctx: &Context, args: &BookArgs) -> Result<(), BookingError> {
    let query = build_query(&args.select)?;
    let api = ctx.api()?;
    let trips = tripbook::search(api.as_ref(), &query).await?;
    if trips.is_empty() {
        return Err(BookingError::NoResults);
    }
    RecoveryCoordinator::new(Arc::clone(&api), Arc::clone(&ctx.store))
        .check_stale_draft(&trips, &TerminalPrompter);

    let trip = pick_trip(&trips, args.trip_id.as_deref(), args.index)?;
    let params = SearchParams {
        from: trip.from.clone(),
        to: trip.to.clone(),
        departure: trip.departure_time.clone(),
    };
    let mut flow = BookingFlow::new(trip, api, Arc::clone(&ctx.store), FlowOptions::default())
        .with_search_params(params);

    if args.adults == 0 {
        return Err(BookingError::Validation("at least one adult is required".into()));
    }
    flow.set_adults(args.adults);
    flow.set_infants(args.infants);

    let form = flow.form_mut();
    form.booker_name = args.name.trim().to_string();
    form.booker_email = args.email.trim().to_string();
    form.set_phone(args.phone.trim());
    if let Some(e) = form.phone_error() {
        return Err(e);
    }

    for (i, spec) in args.passenger.iter().enumerate() {
        let (name, id) = parse_passenger(spec)?;
        form.update(i, PassengerField::Name, name);
        form.update(i, PassengerField::PassportNumberOrIdNumber, id);
    }
    for (i, path) in args.document.iter().enumerate() {
        form.attach_file(i, path).await?;
    }

    for label in &args.seat {
        let id = flow
            .seat_id_for(label)
            .map(str::to_string)
            .ok_or_else(|| BookingError::Validation(format!("no seat \"{label}\" on this trip")))?;
        if !flow.toggle_seat(&id) {
            eprintln!("{}", table::render_seats(flow.seats()));
            return Err(BookingError::Validation(format!(
                "seat {label} is taken, or more seats than adults were requested"
            )));
        }
    }

    drive(&mut flow, &args.payment, ctx.global.json).await
}

async fn run_resume(ctx: &Context, args: &PaymentArgs) -> Result<(), BookingError> {
    let Some(draft) = ctx.drafts().load() else {
        println!("No pending booking.");
        return Ok(());
    };

    let api = ctx.api()?;
    let query = TripQuery::new(draft.from.clone(), draft.to.clone());
    let results = match tripbook::search(api.as_ref(), &query).await {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, "search for the pending booking's route failed");
            Vec::new()
        }
    };

    let coordinator = RecoveryCoordinator::new(Arc::clone(&api), Arc::clone(&ctx.store));
    match coordinator.recover(&results, &TerminalPrompter).await {
        Recovery::Idle => {
            if ctx.tokens().token().is_none() {
                println!("Not signed in. Run `tripbook login --token <TOKEN>` first.");
            } else {
                println!("The pending booking is not waiting to be resumed.");
            }
            Ok(())
        }
        Recovery::Expired | Recovery::Unrecoverable => Ok(()),
        Recovery::Reopen { trip, draft, .. } => {
            let mut flow = BookingFlow::new(trip, api, Arc::clone(&ctx.store), FlowOptions::default());
            flow.restore(&draft);
            if !ctx.global.json {
                println!("{}", table::render(std::slice::from_ref(flow.trip())));
                println!("{}", table::render_seats(flow.seats()));
            }
            drive(&mut flow, args, ctx.global.json).await
        }
    }
}

fn run_login(ctx: &Context, token: &str) -> Result<(), BookingError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(BookingError::Validation("--token must not be empty".into()));
    }
    ctx.tokens().set_token(token)?;
    if ctx.drafts().set_reopen(true)? {
        println!("Signed in. Run `tripbook resume` to continue your pending booking.");
    } else {
        println!("Signed in.");
    }
    Ok(())
}

fn run_draft(ctx: &Context, command: &DraftCommand) -> Result<(), BookingError> {
    let drafts = ctx.drafts();
    match command {
        DraftCommand::Show => match drafts.load() {
            Some(draft) if ctx.global.json => {
                ctx.print_json(&draft);
            }
            Some(draft) => {
                println!("Pending booking: {} → {}", draft.from, draft.to);
                println!("  Booker:   {} <{}> {}", draft.booker_name, draft.booker_email, draft.booker_phone);
                println!("  Adults:   {}  Infants: {}", draft.number_of_adults, draft.number_of_infants);
                println!("  Seats:    {}", draft.selected_seats.join(", "));
                println!("  Total:    {}", draft.total_amount);
                println!("  Reopen:   {}", if draft.should_reopen_modal { "yes" } else { "no" });
                if draft.is_stale() {
                    println!("  (expired, it will be discarded on resume)");
                }
            }
            None => println!("No pending booking."),
        },
        DraftCommand::Clear => {
            drafts.clear()?;
            println!("Pending booking cleared.");
        }
    }
    Ok(())
}

fn run_invoice(input: &Path, output: &Path, open_viewer: bool) -> Result<(), BookingError> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| BookingError::Io(format!("cannot read {}: {e}", input.display())))?;
    let data: BookingData = serde_json::from_str(&text)
        .map_err(|e| BookingError::Invoice(format!("invalid booking data: {e}")))?;
    write_invoice(&data, output, open_viewer)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let json_mode = cli.global.json;
    let ctx = Context::new(cli.global);

    let result = match cli.command {
        Commands::Search(ref args) => run_search(&ctx, args).await,
        Commands::Book(ref args) => run_book(&ctx, args).await,
        Commands::Resume(ref args) => run_resume(&ctx, args).await,
        Commands::Login { ref token } => run_login(&ctx, token),
        Commands::Logout => ctx.tokens().clear().map(|()| println!("Signed out.")),
        Commands::Draft { ref command } => run_draft(&ctx, command),
        Commands::Invoice {
            ref input,
            ref output,
            open,
        } => run_invoice(input, output, open),
    };

    if let Err(e) = result {
        die(&e, json_mode);
    }
}
