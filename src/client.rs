use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use kv_harness::commands::{parse_keys, SCHEMA};
use kv_harness::config::{init_tracing, HarnessArgs};
use kv_harness::*;

/// Line-oriented operator input.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Prompt {
            lines: BufReader::new(stdin()).lines(),
        }
    }

    /// Print `msg` and read one line. `None` once input is closed.
    async fn ask(&mut self, msg: &str) -> Result<Option<String>> {
        print!("{}", msg);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }
}

async fn interactive_set<S: Storage>(session: &Session<S>, prompt: &mut Prompt) -> Result<()> {
    let Some(key) = prompt.ask("Enter Key: ").await? else {
        return Ok(());
    };
    let Some(value) = prompt.ask("Enter Value: ").await? else {
        return Ok(());
    };
    match session.set(&key, &value).await {
        Ok(report) => println!("{}", report),
        Err(e) => error!("Set request failed: {}", e),
    }
    Ok(())
}

async fn interactive_get<S: Storage>(session: &Session<S>, prompt: &mut Prompt) -> Result<()> {
    let Some(key) = prompt.ask("Enter Key: ").await? else {
        return Ok(());
    };
    match session.get(&key).await {
        Ok(report) => println!("{}", report),
        Err(e) => error!("Get request failed: {}", e),
    }
    Ok(())
}

async fn interactive_bulk_get<S: Storage>(
    session: &Session<S>,
    prompt: &mut Prompt,
) -> Result<()> {
    let Some(line) = prompt.ask("Enter keys (comma-separated): ").await? else {
        return Ok(());
    };
    match session.bulk_get(parse_keys(&line)).await {
        Ok(report) => println!("{}", report),
        Err(e) => error!("BulkGet request failed: {}", e),
    }
    Ok(())
}

async fn stress_test<S: Storage>(session: &Session<S>, prompt: &mut Prompt) -> Result<()> {
    let Some(input) = prompt.ask("Enter number of requests: ").await? else {
        return Ok(());
    };
    match session.stress_test(&input).await {
        Ok(result) => println!("{}", result),
        Err(e) => println!("Invalid number. Please try again. ({})", e),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = HarnessArgs::parse();

    let client = connect(&args.addr).await?;
    let session = Session::new(client);
    let mut prompt = Prompt::new();

    loop {
        println!("\n{}", MenuChoice::MENU);
        let choice = match prompt.ask("Enter your choice: ").await? {
            Some(line) => MenuChoice::parse(&line),
            None => Some(MenuChoice::Exit),
        };

        match choice {
            Some(MenuChoice::Set) => interactive_set(&session, &mut prompt).await?,
            Some(MenuChoice::Get) => interactive_get(&session, &mut prompt).await?,
            Some(MenuChoice::BulkGet) => interactive_bulk_get(&session, &mut prompt).await?,
            Some(MenuChoice::Schema) => println!("\n{}", SCHEMA),
            Some(MenuChoice::StressTest) => stress_test(&session, &mut prompt).await?,
            Some(MenuChoice::Exit) => {
                println!("Exiting...");
                break;
            }
            None => println!("Invalid choice. Please try again."),
        }
    }

    drop(session.close());
    info!("channel to {} closed", args.addr);
    Ok(())
}
