//! Dump a saved mean-shape model: point count and coordinates.

use std::env;

use shapewarp::MeanShape;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <mean_shape.bin>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let mean = match MeanShape::load(path) {
        Ok(mean) => mean,
        Err(e) => {
            eprintln!("Failed to load model {}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("Model: {}", path);
    println!("Points: {}", mean.len());

    let mut centroid = (0.0f32, 0.0f32);
    for (i, p) in mean.points().iter().enumerate() {
        println!("  {:>3}: ({:>9.5}, {:>9.5})", i, p.x, p.y);
        centroid.0 += p.x;
        centroid.1 += p.y;
    }

    let n = mean.len() as f32;
    println!("Centroid: ({:.6}, {:.6})", centroid.0 / n, centroid.1 / n);
}
