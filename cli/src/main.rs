use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing_subscriber::EnvFilter;

use quickgram::{Grammar, GrammarError, Sym};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} FILE [options]

Options:
  -h, --help      Print this message
  -c, --chart     Print the parse chart (defaults to not printing)
  -t, --trees     Print every parse tree (defaults to printing the count only)
  -e, --eval      Print the evaluated value of each parse tree
  -r, --random N  Print N random sentences from the grammar and exit",
    prog_name
  )
}

fn parse(g: &Grammar<Sym>, sentence: &str, opts: &Args) -> Result<(), GrammarError> {
  let tokens = Sym::terminals(sentence);

  if opts.print_chart {
    let chart = g.parse_chart(&tokens, &[]);
    println!("chart:\n{}", chart);
  }

  let forest = g.parse(&tokens);
  let trees = forest.trees().collect::<Vec<_>>();

  println!(
    "Parsed {} tree{}",
    trees.len(),
    if trees.len() == 1 { "" } else { "s" }
  );

  for tree in trees {
    if opts.print_trees {
      println!("{}", tree);
    }
    if opts.print_values {
      println!("= {}", tree.evaluate());
    }
    if opts.print_trees || opts.print_values {
      println!();
    }
  }

  Ok(())
}

fn generate(g: &Grammar<Sym>, count: usize) -> Result<(), GrammarError> {
  for _ in 0..count {
    let tokens = g.random_substitution()?;
    let words = tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    println!("{}", words.join(" "));
  }
  Ok(())
}

struct Args {
  filename: String,
  print_chart: bool,
  print_trees: bool,
  print_values: bool,
  random: Option<usize>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "quickgram"));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut filename: Option<String> = None;
    let mut print_chart = false;
    let mut print_trees = false;
    let mut print_values = false;
    let mut random = None;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-t" || o == "--trees" {
        print_trees = true;
      } else if o == "-e" || o == "--eval" {
        print_values = true;
      } else if o == "-r" || o == "--random" {
        let count = iter
          .next()
          .and_then(|n| n.parse::<usize>().ok())
          .ok_or_else(|| Self::make_error_message("--random needs a count", &prog_name))?;
        random = Some(count);
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        print_chart,
        print_trees,
        print_values,
        random,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }
}

fn main() -> Result<(), GrammarError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let g = Grammar::read_from_file(&opts.filename)?;

  if let Some(count) = opts.random {
    return generate(&g, count);
  }

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush().map_err(GrammarError::Io)?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        input.make_ascii_lowercase();
        parse(&g, input.trim(), &opts)?;
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
