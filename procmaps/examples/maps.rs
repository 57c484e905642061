// Dump the memory mappings of a process
//
// Usage: cargo run --example=maps [pid]
//
// Without a pid (or with a negative one) this dumps its own mappings.

use procmaps::MapsSource;

fn main() {
    env_logger::init();

    let source = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<i32>().ok())
        .map(MapsSource::from)
        .unwrap_or(MapsSource::Myself);

    let maps = match procmaps::parse(source) {
        Ok(maps) => maps,
        Err(e) => {
            eprintln!("[map]: cannot parse the memory map of {:?}: {}", source, e);
            std::process::exit(1);
        }
    };

    let mut cursor = maps.cursor();
    while let Some(map) = cursor.advance() {
        println!("{:#x?}", map);
    }

    maps.release();
}
