use clap::Parser;
use rule_coerce::{ConstraintName, Options, Rule, Type, Value};
use tracing::{debug, Level};

/// Coerce a value to a type and check it against constraints.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Target type name (int, float, decimal, str, bool, date, datetime, list, ...)
    target: Type,
    /// Input value; parsed as JSON when possible, taken as a string otherwise
    value: String,
    /// Item type for list and set targets
    #[arg(long)]
    item: Option<Type>,
    #[arg(long)]
    gt: Option<String>,
    #[arg(long)]
    ge: Option<String>,
    #[arg(long)]
    lt: Option<String>,
    #[arg(long)]
    le: Option<String>,
    #[arg(long)]
    min_length: Option<usize>,
    #[arg(long)]
    max_length: Option<usize>,
    /// Regular expression the value must match
    #[arg(long)]
    pattern: Option<String>,
    /// Clamp bounds and truncate lengths instead of rejecting
    #[arg(long)]
    lax: bool,
    #[arg(long)]
    no_explicit_cast: bool,
    #[arg(long)]
    no_data_loss: bool,
    /// Log coercion decisions
    #[arg(short, long)]
    verbose: bool,
}

fn json_or_text(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(raw),
    }
}

fn build_rule(args: &Args) -> Result<Rule, rule_coerce::DeclarationError> {
    // Container targets take their item rule as the single type argument.
    let item = args.item.clone().map(Rule::of);
    let mut builder = Rule::builder(args.target.clone());
    if let Some(item) = item {
        builder = builder.arg(item);
    }
    let bounds = [
        (ConstraintName::Gt, &args.gt),
        (ConstraintName::Ge, &args.ge),
        (ConstraintName::Lt, &args.lt),
        (ConstraintName::Le, &args.le),
    ];
    // Bounds are JSON when possible so `--ge 1.5` stays numeric.
    for (name, bound) in bounds {
        if let Some(bound) = bound {
            let bound = json_or_text(bound);
            builder = if args.lax { builder.lax(name, bound) } else { builder.constraint(name, bound) };
        }
    }
    if let Some(length) = args.min_length {
        builder = builder.min_length(length);
    }
    if let Some(length) = args.max_length {
        builder = if args.lax { builder.lax(ConstraintName::MaxLength, length) } else { builder.max_length(length) };
    }
    if let Some(pattern) = &args.pattern {
        builder = builder.pattern(pattern.clone());
    }
    builder.build()
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    // Logs on stderr, result on stdout.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    // Declaration errors are reported before any input is touched.
    let rule = match build_rule(&args) {
        Ok(rule) => rule,
        Err(e) => {
            eprintln!("Invalid rule: {e}");
            std::process::exit(1);
        }
    };
    debug!(?rule, "built rule");

    // Build options.
    let options = Options {
        no_explicit_cast: Some(args.no_explicit_cast),
        no_data_loss: Some(args.no_data_loss),
        ..Options::default()
    };

    // Coerce and print the result as pretty JSON.
    match rule.apply_with(json_or_text(&args.value), &options) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Cannot render result: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
