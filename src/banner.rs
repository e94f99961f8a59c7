// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    // Using a raw string literal for the multi-line banner
    let banner = r#"
  __ _ _   _  ___  ___ ___
 / _` | | | |/ _ \/ __/ __|
| (_| | |_| |  __/\__ \__ \
 \__, |\__,_|\___||___/___/
 |___/
    the output
"#;
    println!("{}", banner);
}
