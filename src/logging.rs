use std::panic;
use std::thread;

/// Install the `env_logger` backend and a panic hook that logs before the default one
/// runs. `RUST_LOG` overrides the default level. Calling this more than once is harmless.
pub fn init() {
    let default_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::builder();
    builder.filter_level(default_level).parse_default_env();
    #[cfg(windows)]
    builder.target(env_logger::Target::Pipe(Box::new(debugger::DebuggerWriter::default())));

    if builder.try_init().is_err() {
        // Someone else (a host, or an earlier call) already set the logger.
        return;
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let thread = thread::current();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<dyn Any>");
        match info.location() {
            Some(location) => log::error!(
                "thread '{}' panicked at {}:{}: {}",
                thread.name().unwrap_or("<unnamed>"),
                location.file(),
                location.line(),
                message
            ),
            None => log::error!(
                "thread '{}' panicked: {}",
                thread.name().unwrap_or("<unnamed>"),
                message
            ),
        }
        default_hook(info);
    }));
}

#[cfg(windows)]
mod debugger {
    use std::io::{self, Write};

    use windows::core::PCSTR;
    use windows::Win32::System::Diagnostics::Debug::OutputDebugStringA;

    /// Forwards whole lines to the attached debugger.
    #[derive(Default)]
    pub struct DebuggerWriter {
        line: Vec<u8>,
    }

    impl DebuggerWriter {
        fn emit(&mut self) {
            if self.line.is_empty() {
                return;
            }
            self.line.retain(|&b| b != 0);
            self.line.push(0);
            unsafe { OutputDebugStringA(PCSTR(self.line.as_ptr())) };
            self.line.clear();
        }
    }

    impl Write for DebuggerWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            for &byte in buf {
                self.line.push(byte);
                if byte == b'\n' {
                    self.emit();
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.emit();
            Ok(())
        }
    }
}
