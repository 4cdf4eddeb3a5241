use std::error::Error;

use imgmatch::reference_demo;

fn main() -> Result<(), Box<dyn Error>> {
    let hits = reference_demo()?;

    println!("Top {} matches for [0.1, 0.2, 0.3]:", hits.len());
    for hit in hits {
        println!("  {:<8} similarity={:.4}", hit.id, hit.similarity);
    }

    Ok(())
}
