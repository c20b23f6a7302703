//! Deploy command: generate and stream over the loopback device.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use parche_model::load_patch;
use parche_session::{
    DeployOutcome, LoopbackTransport, Session, SessionEvent, Transport as _,
};

use super::generate::generate_checked;

#[derive(Args)]
pub struct DeployArgs {
    /// Patch file to deploy
    #[arg(value_name = "PATCH")]
    patch: PathBuf,

    /// Packet size of the emulated transport, in bytes
    #[arg(long, default_value_t = 64)]
    packet_size: usize,
}

pub fn run(args: DeployArgs) -> anyhow::Result<()> {
    let patch = load_patch(&args.patch)?;
    let result = generate_checked(&patch)?;

    // Dry run: the generated source stands in for the external compiler's
    // binary output and is streamed over the in-memory device.
    let binary = result.source.into_bytes();

    let transport = LoopbackTransport::new().with_packet_size(args.packet_size);
    let (mut session, events) = Session::new(transport);
    session.attach()?;
    if let Some(signature) = session.firmware_signature() {
        println!("Connected, running firmware {signature:016x}");
    }

    println!(
        "Deploying {} bytes in packets of {}...",
        binary.len(),
        session.transport().max_packet_size()
    );
    let pb = ProgressBar::new(binary.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let cancel = AtomicBool::new(false);
    let outcome = session.deploy(&binary, &cancel)?;
    for event in events.try_iter() {
        if let SessionEvent::TransferProgress { sent, .. } = event {
            pb.set_position(sent);
        }
    }
    pb.finish_with_message("done");

    match outcome {
        DeployOutcome::Completed => {
            println!(
                "Device committed {} byte(s); {} addressable parameter(s)",
                session.transport().committed().len(),
                result.manifest.param_count
            );
        }
        DeployOutcome::Cancelled => println!("Deploy cancelled; device untouched"),
    }
    session.detach();
    Ok(())
}
