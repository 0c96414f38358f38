//! Scripted TinyFS demonstration.
//!
//! Formats a fresh disk, mounts it, creates one file, writes a greeting,
//! reads it back byte by byte, seeks back to the start, and unmounts.
//! The disk file name is the single optional argument.

use tinyfs::{DEFAULT_DISK_NAME, DEFAULT_DISK_SIZE, TfsError, TinyFs};

fn main() {
    env_logger::init();
    let diskname = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DISK_NAME.to_owned());
    if let Err(e) = run(&diskname) {
        eprintln!("demo failed: {e} (code {})", e.code());
        std::process::exit(1);
    }
}

fn run(diskname: &str) -> Result<(), TfsError> {
    TinyFs::mkfs(diskname, DEFAULT_DISK_SIZE)?;
    println!("formatted {diskname} ({DEFAULT_DISK_SIZE} bytes)");

    let mut fs = TinyFs::new();
    fs.mount(diskname)?;
    println!("mounted {diskname}");

    let fd = fs.open_file("file_01")?;
    println!("opened file_01 as fd {fd}");

    let message = b"Hello, World!";
    fs.write_file(fd, message)?;
    println!("wrote {} bytes", message.len());

    print!("read back: ");
    for _ in 0..message.len() {
        print!("{}", fs.read_byte(fd)? as char);
    }
    println!();

    match fs.read_byte(fd) {
        Err(TfsError::EofError) => println!("hit end of file, as expected"),
        other => println!("unexpected result past the end: {other:?}"),
    }

    fs.seek(fd, 0)?;
    println!("after seek(0), first byte: {:?}", fs.read_byte(fd)? as char);

    fs.unmount()?;
    println!("unmounted {diskname}");
    Ok(())
}
