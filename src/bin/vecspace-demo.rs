//! vecspace demo
//!
//! Evaluates token arithmetic such as `king - man + woman` over a small
//! built-in vocabulary and prints the closest tokens.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vecspace::{
    Metric, NearestNeighborSearch, SearchConfig, Sign, Similarity, SpaceConfig, VectorSpace,
};

/// Dimensions: royalty, femininity, personhood, geography
const SAMPLE: &[(&str, [f32; 4])] = &[
    ("king", [0.9, 0.1, 0.8, 0.0]),
    ("queen", [0.9, 0.9, 0.8, 0.0]),
    ("man", [0.1, 0.1, 0.9, 0.0]),
    ("woman", [0.1, 0.9, 0.9, 0.0]),
    ("prince", [0.7, 0.1, 0.6, 0.0]),
    ("princess", [0.7, 0.9, 0.6, 0.0]),
    ("boy", [0.0, 0.1, 0.5, 0.0]),
    ("girl", [0.0, 0.9, 0.5, 0.0]),
    ("palace", [0.8, 0.5, 0.1, 0.6]),
    ("village", [0.0, 0.5, 0.2, 0.8]),
];

/// vecspace demo - vector arithmetic and nearest tokens
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Token arithmetic, e.g. "king - man + woman"
    #[arg(required_unless_present = "list")]
    expression: Option<String>,

    /// Number of results
    #[arg(short = 'k', long, default_value_t = 1)]
    top_k: usize,

    /// Similarity metric (cosine, dot, euclidean)
    #[arg(long, default_value_t = Metric::Cosine)]
    metric: Metric,

    /// Allow the expression's own tokens in the results
    #[arg(long)]
    keep_inputs: bool,

    /// Fold tokens to lowercase
    #[arg(long)]
    case_insensitive: bool,

    /// Drop results scoring below this value
    #[arg(long)]
    min_score: Option<f32>,

    /// Print the sample vocabulary and exit
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("vecspace=info".parse()?))
        .init();

    let args = Args::parse();

    let space = VectorSpace::with_config(
        SAMPLE.iter().map(|(token, v)| (*token, v.to_vec())),
        SpaceConfig::default().with_case_sensitive(!args.case_insensitive),
    )?;

    if args.list {
        for (token, vector) in space.iter() {
            println!("{:<10} {:?}", token, vector);
        }
        return Ok(());
    }

    let Some(expression) = args.expression.as_deref() else {
        anyhow::bail!("an expression is required unless --list is given");
    };
    let terms = parse_expression(expression)?;
    let terms: Vec<(&str, Sign)> = terms.iter().map(|(t, s)| (t.as_str(), *s)).collect();

    let mut config = SearchConfig::default();
    if let Some(min) = args.min_score {
        config = config.with_min_score(min);
    }
    let search = NearestNeighborSearch::with_similarity(&space, args.metric).with_config(config);

    let query = space.combine_tokens(&terms)?;
    info!(
        terms = terms.len(),
        metric = search.similarity().name(),
        "Evaluated expression"
    );

    let exclude: Vec<&str> = if args.keep_inputs {
        Vec::new()
    } else {
        terms.iter().map(|(t, _)| *t).collect()
    };
    let result = search.query_excluding(&query, args.top_k, &exclude)?;

    if result.is_empty() {
        println!("No matches");
    }
    for (rank, neighbor) in result.iter().enumerate() {
        println!("{:>2}. {:<10} {:.4}", rank + 1, neighbor.token, neighbor.score);
    }

    Ok(())
}

/// Split `a - b + c` into signed terms. Operators may stand alone or prefix
/// a token; the first term defaults to `+`.
fn parse_expression(input: &str) -> anyhow::Result<Vec<(String, Sign)>> {
    let mut terms = Vec::new();
    let mut pending: Option<Sign> = None;

    for word in input.split_whitespace() {
        let (sign, token) = if let Some(rest) = word.strip_prefix('+') {
            (Some(Sign::Plus), rest)
        } else if let Some(rest) = word.strip_prefix('-') {
            (Some(Sign::Minus), rest)
        } else {
            (None, word)
        };

        if let Some(sign) = sign {
            if pending.is_some() {
                anyhow::bail!("two operators in a row near '{}'", word);
            }
            pending = Some(sign);
        }
        if token.is_empty() {
            continue;
        }
        if !terms.is_empty() && pending.is_none() {
            anyhow::bail!("missing operator before '{}'", token);
        }

        terms.push((token.to_string(), pending.take().unwrap_or(Sign::Plus)));
    }

    if pending.is_some() {
        anyhow::bail!("expression ends with an operator");
    }
    if terms.is_empty() {
        anyhow::bail!("expression has no terms");
    }
    Ok(terms)
}
