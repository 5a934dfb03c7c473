use voice_session::utils;

fn main() -> anyhow::Result<()> {
    let inputs = utils::device::get_available_inputs()?;
    println!("Available inputs: {}", inputs);

    let outputs = utils::device::get_available_outputs()?;
    println!("Available outputs: {}", outputs);
    Ok(())
}
