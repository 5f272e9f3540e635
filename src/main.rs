use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use library_ledger::application::catalog::BookService;
use library_ledger::application::coordinator::LoanCoordinator;
use library_ledger::application::members::PartnerService;
use library_ledger::application::staff::UserService;
use library_ledger::config::LibraryConfig;
use library_ledger::domain::book::{Book, Isbn};
use library_ledger::domain::loan::LoanId;
use library_ledger::domain::partner::{NewPartner, PartnerId};
use library_ledger::domain::ports::LibraryStoreRef;
use library_ledger::domain::user::{NewUser, StaffRole, UserId};
use library_ledger::infrastructure::sqlite::SqliteStore;
use library_ledger::interfaces::csv::book_reader::BookReader;
use library_ledger::interfaces::csv::report_writer::{LoanReportRow, ReportWriter};
use library_ledger::telemetry;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: LibraryConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the book catalog
    #[command(subcommand)]
    Book(BookCommand),

    /// Manage partners
    #[command(subcommand)]
    Partner(PartnerCommand),

    /// Manage staff accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Lend one copy of a book to a partner
    Lend {
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        partner: i64,
        /// Due date (YYYY-MM-DD); defaults to today plus the loan period
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Return a loan, charging the fine for late days
    Return {
        loan_id: i64,
        /// Return date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Compute the fine for a return date against a due date
    Fine {
        #[arg(long)]
        due: NaiveDate,
        #[arg(long)]
        returned: NaiveDate,
    },

    /// Print a report to stdout
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand)]
enum BookCommand {
    /// Register a new book
    Add {
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "0")]
        price: Decimal,
        #[arg(long)]
        copies: i64,
    },
    /// List books, optionally filtered (filters only match active books)
    List {
        #[arg(long, conflicts_with = "author")]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Import books from a CSV file
    Import { input: PathBuf },
    /// Make a book available for loans again
    Activate { isbn: String },
    /// Withdraw a book from the catalog
    Deactivate { isbn: String },
}

#[derive(Subcommand)]
enum PartnerCommand {
    /// Register a new partner
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// List partners
    List,
    /// Stop a partner from borrowing
    Deactivate { id: i64 },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a staff account
    Add {
        username: String,
        #[arg(long, default_value = "ASSISTANT")]
        role: StaffRole,
        #[arg(long, env = "LIBRARY_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List staff accounts
    List,
    /// Check a username and password
    Login {
        username: String,
        #[arg(long, env = "LIBRARY_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Stop an account from logging in
    Deactivate { id: i64 },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Every book with its stock counters
    Books,
    /// Loans not yet returned
    Active {
        #[arg(long)]
        json: bool,
        /// Date the lateness is evaluated for; defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Open loans past their due date
    Overdue {
        #[arg(long)]
        json: bool,
        /// Date the lateness is evaluated for; defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.config.log_json);
    cli.config.validate()?;

    let today = Local::now().date_naive();
    let fine_rule = cli.config.fine_rule()?;

    let store: LibraryStoreRef = Arc::new(SqliteStore::connect(&cli.config).await?);
    let coordinator = LoanCoordinator::new(store.clone(), fine_rule);

    match cli.command {
        Command::Book(command) => run_book(BookService::new(store), command).await?,
        Command::Partner(command) => run_partner(PartnerService::new(store), command).await?,
        Command::User(command) => run_user(UserService::new(store), command).await?,
        Command::Lend { isbn, partner, due } => {
            let due = match due {
                Some(due) => due,
                None => cli.config.due_date(today)?,
            };
            let loan = coordinator
                .register_loan(&Isbn::new(isbn)?, PartnerId(partner), due)
                .await?;
            println!(
                "Loan {} registered: ISBN {} to partner {}, due {}",
                loan.id, loan.book_isbn, loan.partner_id, loan.due_date
            );
        }
        Command::Return { loan_id, date } => {
            let receipt = coordinator
                .process_return(LoanId(loan_id), date.unwrap_or(today))
                .await?;
            println!(
                "Loan {} returned on {}: {} day(s) late, fine {}",
                receipt.loan_id, receipt.return_date, receipt.days_late, receipt.fine
            );
        }
        Command::Fine { due, returned } => {
            println!("{}", coordinator.calculate_fine(due, returned));
        }
        Command::Report(command) => run_report(&coordinator, store, command, today).await?,
    }

    Ok(())
}

async fn run_book(books: BookService, command: BookCommand) -> Result<()> {
    match command {
        BookCommand::Add {
            isbn,
            title,
            author,
            category,
            price,
            copies,
        } => {
            let book = Book::new(Isbn::new(isbn)?, title, author, category, price, copies);
            books.register(&book).await?;
            println!("Book {} registered with {} copies", book.isbn, book.total_copies);
        }
        BookCommand::List { category, author } => {
            let list = match (category, author) {
                (Some(category), _) => books.filter_by_category(&category).await?,
                (None, Some(author)) => books.filter_by_author(&author).await?,
                (None, None) => books.list().await?,
            };
            ReportWriter::new(io::stdout().lock()).write_books(&list)?;
        }
        BookCommand::Import { input } => {
            let file = File::open(input).into_diagnostic()?;
            let reader = BookReader::new(file);
            let mut imported = 0usize;
            for book_result in reader.books() {
                match book_result {
                    Ok(book) => match books.register(&book).await {
                        Ok(()) => imported += 1,
                        Err(e) => eprintln!("Error importing book {}: {}", book.isbn, e),
                    },
                    Err(e) => {
                        eprintln!("Error reading book: {}", e);
                    }
                }
            }
            println!("Imported {} book(s)", imported);
        }
        BookCommand::Activate { isbn } => {
            books.set_active(&Isbn::new(isbn)?, true).await?;
        }
        BookCommand::Deactivate { isbn } => {
            books.set_active(&Isbn::new(isbn)?, false).await?;
        }
    }
    Ok(())
}

async fn run_partner(partners: PartnerService, command: PartnerCommand) -> Result<()> {
    match command {
        PartnerCommand::Add { name, email } => {
            let partner = partners.register(&NewPartner::new(name, email)).await?;
            println!("Partner {} registered", partner.id);
        }
        PartnerCommand::List => {
            for partner in partners.list().await? {
                let status = if partner.is_active { "active" } else { "inactive" };
                println!("{}\t{}\t{}\t{}", partner.id, partner.name, partner.email, status);
            }
        }
        PartnerCommand::Deactivate { id } => {
            partners.deactivate(PartnerId(id)).await?;
        }
    }
    Ok(())
}

async fn run_user(users: UserService, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Add {
            username,
            role,
            password,
        } => {
            let user = users.register(&NewUser::new(username, password, role)).await?;
            println!("User {} registered as {}", user.id, user.role);
        }
        UserCommand::List => {
            for user in users.list().await? {
                let status = if user.is_active { "active" } else { "inactive" };
                println!("{}\t{}\t{}\t{}", user.id, user.username, user.role, status);
            }
        }
        UserCommand::Login { username, password } => {
            let user = users.login(&username, &password).await?;
            println!("Welcome {} ({})", user.username, user.role);
        }
        UserCommand::Deactivate { id } => {
            users.deactivate(UserId(id)).await?;
        }
    }
    Ok(())
}

async fn run_report(
    coordinator: &LoanCoordinator,
    store: LibraryStoreRef,
    command: ReportCommand,
    today: NaiveDate,
) -> Result<()> {
    let stdout = io::stdout();
    let (loans, json, today) = match command {
        ReportCommand::Books => {
            let books = BookService::new(store).list().await?;
            ReportWriter::new(stdout.lock()).write_books(&books)?;
            return Ok(());
        }
        ReportCommand::Active { json, today: at } => {
            (coordinator.active_loans().await?, json, at.unwrap_or(today))
        }
        ReportCommand::Overdue { json, today: at } => {
            let at = at.unwrap_or(today);
            (coordinator.overdue_loans(at).await?, json, at)
        }
    };

    let rule = coordinator.fine_rule();
    let rows: Vec<LoanReportRow> = loans
        .iter()
        .map(|loan| LoanReportRow::from_loan(loan, &rule, today))
        .collect();

    let writer = ReportWriter::new(stdout.lock());
    if json {
        writer.write_loans_json(&rows)?;
    } else {
        writer.write_loans(&rows)?;
    }
    Ok(())
}
