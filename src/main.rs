use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::LevelFilter;
use serde::Serialize;

use cmuapi::{
    CourseQuery, DirectoryClient, DirectoryInfo, PRINTER_STATUS_URL, PrinterStatusClient,
    RequestClient, SchedulingClient, Semester, config::RequestConfig,
};

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the departments offering courses
    Departments {
        /// Semester token, i.e.: F24. Default to current semester
        #[clap(short, long)]
        semester: Option<Semester>,
    },
    /// List courses, for one department or all of them
    Courses {
        #[clap(short, long)]
        semester: Option<Semester>,
        #[clap(short, long)]
        department: Option<u32>,
    },
    /// Show one course, by five digit id or department and number
    Course {
        #[clap(short, long)]
        semester: Option<Semester>,
        #[clap(long, conflicts_with_all = ["department", "number"])]
        id: Option<u32>,
        #[clap(short, long, requires = "number")]
        department: Option<u32>,
        #[clap(short, long, requires = "department")]
        number: Option<u32>,
    },
    /// Look someone up by Andrew ID
    Person { andrew_id: String },
    /// Search the directory
    Search {
        #[clap(required = true)]
        query: Vec<String>,
    },
    /// Show printer status, i.e.: Gates 3. Every printer when no name is given
    Printer { name: Vec<String> },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, request_client: RequestClient) -> anyhow::Result<()> {
    match command {
        Command::Departments { semester } => {
            let scheduling = SchedulingClient::from_env()?.with_request_client(request_client);
            let semester = semester.unwrap_or_else(Semester::current);
            print_json(&scheduling.departments(&semester).await?)
        }
        Command::Courses {
            semester,
            department,
        } => {
            let mut scheduling =
                SchedulingClient::from_env()?.with_request_client(request_client);
            let semester = semester.unwrap_or_else(Semester::current);
            match department {
                Some(department) => print_json(&scheduling.courses(&semester, department).await?),
                None => print_json(&scheduling.all_courses(&semester).await?),
            }
        }
        Command::Course {
            semester,
            id,
            department,
            number,
        } => {
            let mut scheduling =
                SchedulingClient::from_env()?.with_request_client(request_client);
            let semester = semester.unwrap_or_else(Semester::current);
            let query = CourseQuery {
                course_id: id,
                department,
                course_number: number,
            };
            print_json(&scheduling.course(&semester, &query).await?)
        }
        Command::Person { andrew_id } => {
            let directory = DirectoryClient::new()?.with_request_client(request_client);
            match directory.get_info(None, Some(&andrew_id)).await? {
                DirectoryInfo::Person(person) => print_json(&person),
                DirectoryInfo::People(people) => print_json(&people),
            }
        }
        Command::Search { query } => {
            let directory = DirectoryClient::new()?.with_request_client(request_client);
            print_json(&directory.search_people(&query.join(" ")).await?)
        }
        Command::Printer { name } => {
            let printers =
                PrinterStatusClient::from_url(PRINTER_STATUS_URL, &request_client).await?;
            if name.is_empty() {
                print_json(&printers.get_all_statuses())
            } else {
                let name = name.join(" ");
                let status = printers
                    .get_status(&name)
                    .with_context(|| format!("no printer matches {name:?}"))?;
                print_json(status)
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let request_client = RequestClient::with_config(&RequestConfig::from_env()?)?;
    run(args.command, request_client).await
}
