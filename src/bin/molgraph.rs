use anyhow::{bail, Result};
use molgraph::*;

fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut show_tokens = false;
    let mut log_level = "warn".to_string();
    args.retain(|arg| match arg.as_str() {
        "--tokens" => {
            show_tokens = true;
            false
        }
        "--verbose" | "-v" => {
            log_level = "trace".to_string();
            false
        }
        _ => true,
    });
    init_logging(&log_level);

    if args.is_empty() {
        bail!("Usage: molgraph [--tokens] [--verbose] SMILES...");
    }

    for smiles in &args {
        if show_tokens {
            for token in normalize(tokenize(smiles)) {
                println!("{:>4}  {:<6} {:?}", token.position, token.text, token.kind);
            }
        }
        let molecule = parse(smiles)?;
        println!("{smiles}");
        println!("  formula: {}", molecule.formula_string());
        println!("  weight:  {}", molecule.molecular_weight);
        println!(
            "  atoms:   {} ({} bonds)",
            molecule.atom_count(),
            molecule.bond_count()
        );
    }

    Ok(())
}
