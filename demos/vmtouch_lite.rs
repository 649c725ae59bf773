use clockmem::aggregate::percent;
use clockmem::probe_fd;

use std::env::args;
use std::fs::File;

pub fn main() -> Result<(), String> {
    let args_vec: Vec<_> = args().collect();
    if args_vec.len() != 2 {
        return Err(format!("Usage: {} [filename]", args_vec[0]));
    }
    let open_file = File::open(&args_vec[1]).map_err(|e| format!("Error opening file: {}", e))?;

    let resident_map = probe_fd(&open_file).map_err(|e| format!("Error finding cached pages: {}", e))?;
    let page_count = resident_map.len();
    let resident_count = resident_map.iter().filter(|x| **x).count();

    println!(
        "Resident pages {}/{} ({:.1}%)",
        resident_count,
        page_count,
        percent(resident_count as u64, page_count as u64)
    );
    Ok(())
}
