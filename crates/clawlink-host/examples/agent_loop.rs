//! Keyword-driven mock agent controlling a device through the host client.
//!
//! ```text
//! cargo run -p clawlink-host --example agent_loop                 # simulated device
//! cargo run -p clawlink-host --example agent_loop -- /dev/ttyACM0 # real board
//! cargo run -p clawlink-host --example agent_loop -- --interactive
//! ```
//!
//! Swap `MockAgent::reply` for a call into an LLM framework; the tool schemas
//! it would need come from `clawlink schema`.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use clawlink_agent::{AgentConfig, AgentEngine, DeviceAgent, StopHandle};
use clawlink_core::{HistoryEntry, Link, MemoryLink};
use clawlink_host::{Client, ClientConfig};

const LED_PIN: u8 = 25;

const SCRIPT: [&str; 5] = [
    "Turn the LED on",
    "Wait a moment",
    "Turn the LED off",
    "Read the sensor",
    "Help",
];

struct MockAgent<'a, L: Link> {
    client: &'a mut Client<L>,
    history: Vec<HistoryEntry>,
}

impl<'a, L: Link> MockAgent<'a, L> {
    fn new(client: &'a mut Client<L>) -> Self {
        Self {
            client,
            history: Vec::new(),
        }
    }

    fn process(&mut self, message: &str) -> Result<String, Box<dyn Error>> {
        self.history.push(HistoryEntry::new("user", message));
        let reply = self.reply(message)?;
        self.history.push(HistoryEntry::new("assistant", reply.as_str()));
        Ok(reply)
    }

    fn reply(&mut self, message: &str) -> Result<String, Box<dyn Error>> {
        let lower = message.to_lowercase();
        let reply = if lower.contains("led") && lower.contains("on") && !lower.contains("off") {
            self.client.gpio_write(LED_PIN, true)?;
            format!("I've turned on the on-board LED (GPIO {LED_PIN}).")
        } else if lower.contains("led") && lower.contains("off") {
            self.client.gpio_write(LED_PIN, false)?;
            "I've turned off the on-board LED.".to_owned()
        } else if lower.contains("read") && (lower.contains("sensor") || lower.contains("adc")) {
            let volts = self.client.adc_read_voltage(0)?;
            format!("ADC channel 0 voltage: {volts:.3}V")
        } else if lower.contains("help") {
            "I can help you control hardware. Try:\n\
             - \"Turn the LED on\" / \"Turn the LED off\"\n\
             - \"Read the sensor on ADC channel 0\"\n\
             - \"Help\" to see this message"
                .to_owned()
        } else {
            format!("I understand: '{message}'. How would you like to control the hardware?")
        };
        Ok(reply)
    }
}

fn run<L: Link>(client: &mut Client<L>, interactive: bool) -> Result<(), Box<dyn Error>> {
    let info = client.connect()?;
    println!("Hardware connected: {} (firmware {})", info.board, info.version);
    println!("Available tools: {}\n", client.list_tools()?.join(", "));

    let mut agent = MockAgent::new(client);
    if interactive {
        println!("Type 'quit' to exit\n");
        let stdin = io::stdin();
        loop {
            print!("You: ");
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
                break;
            }
            match agent.process(line) {
                Ok(reply) => println!("Agent: {reply}\n"),
                Err(error) => println!("Error: {error}\n"),
            }
        }
    } else {
        for message in SCRIPT {
            println!(">>> {message}");
            println!("Agent: {}\n", agent.process(message)?);
        }
    }
    println!("Conversation held {} turns.", agent.history.len());
    Ok(())
}

fn spawn_simulated_device() -> (MemoryLink, StopHandle, thread::JoinHandle<()>) {
    let (host, device) = MemoryLink::pair();
    let config = AgentConfig::default().with_idle_sleep(Duration::from_millis(1));
    let mut agent = DeviceAgent::new(AgentEngine::new(config), device);
    let stop = agent.stop_handle();
    let worker = thread::spawn(move || {
        if let Err(error) = agent.run() {
            eprintln!("simulated device stopped: {error}");
        }
    });
    (host, stop, worker)
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut interactive = false;
    let mut endpoint = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--interactive" | "-i" => interactive = true,
            _ => endpoint = Some(arg),
        }
    }

    match endpoint {
        Some(endpoint) => {
            let mut client = Client::open(ClientConfig::default().with_endpoint(endpoint))?;
            run(&mut client, interactive)
        }
        None => {
            println!("No port given; running against a simulated RP2040.\n");
            let (link, stop, worker) = spawn_simulated_device();
            let mut client = Client::with_link(link, ClientConfig::default());
            let outcome = run(&mut client, interactive);
            stop.stop();
            if worker.join().is_err() {
                eprintln!("simulated device panicked");
            }
            outcome
        }
    }
}
