use std::time::Instant;

use miniminer::{BlockData, Entry, Searcher};

fn main() -> anyhow::Result<()> {
    let block = BlockData::new(vec![
        Entry::new("Hello", 1i64),
        Entry::new("World", "你好"),
    ]);
    for difficulty in 0..=20 {
        let mut milliseconds = Vec::new();
        for _ in 1..=10 {
            let now = Instant::now();
            let _s = Searcher::new(&block, difficulty).with_all_cores().run()?;
            milliseconds.push(now.elapsed().as_millis() as u64);
        }
        let sum: u64 = milliseconds.iter().sum();
        println!("{},{}", difficulty, sum / milliseconds.len() as u64);
    }

    Ok(())
}
