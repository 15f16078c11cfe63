/*!
The seam to the in-browser JVM.

The runtime itself is opaque: it takes source files as byte blobs at
virtual paths, and runs a main class with a classpath and arguments.
Compilation is just running `javac`'s main class.

A running program sees the outside world through `ProgramIo`: its console,
and a `StdinGuest` the runtime calls from the input adapter's
`requestLine()` native.
*/
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::stdin::StdinGuest;

pub const SOURCE_DIR: &str = "/str/";
pub const CLASSPATH: &str = "/app/tools.jar:/files/";
pub const JAVAC_MAIN: &str = "com.sun.tools.javac.Main";
pub const INPUT_ADAPTER_CLASS: &str = "CustomFileInputStream";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

/// Where a running program's output goes.
pub trait Console: Send {
    fn stdout(&mut self, text: &str);
    fn stderr(&mut self, text: &str);
    /// A line of input the program has consumed, without its newline.
    fn input(&mut self, text: &str);
}

pub struct ProgramIo<'a> {
    console: &'a mut dyn Console,
    stdin: &'a mut StdinGuest,
    timeout: Duration,
}

impl<'a> ProgramIo<'a> {
    pub fn new(
        console: &'a mut dyn Console,
        stdin: &'a mut StdinGuest,
        timeout: Duration,
    ) -> Self {
        Self { console, stdin, timeout }
    }

    pub fn stdout(&mut self, text: &str) { self.console.stdout(text); }
    pub fn stderr(&mut self, text: &str) { self.console.stderr(text); }

    /**
    What `requestLine()` returns to the program: the next line of input,
    newline included, echoed to the console.

    `None` (Java's `null`, so end of input) once a read fails; see
    `StdinGuest::read_line()`.
    */
    pub async fn request_line(&mut self) -> Option<String> {
        match self.stdin.read_line(self.timeout).await {
            Ok(line) => {
                self.console.input(line.trim_end_matches('\n'));
                Some(line)
            },
            Err(e) => {
                log::debug!("requestLine(): {}", &e);
                None
            },
        }
    }
}

#[async_trait]
pub trait JavaRuntime: Send {
    /// False until the runtime has finished loading.
    fn is_ready(&self) -> bool;

    async fn add_string_file(&mut self, path: &str, contents: &[u8]) -> Result<(), RuntimeError>;

    /// Returns the program's exit code.
    async fn run_main(
        &mut self,
        class: &str,
        classpath: &str,
        args: &[String],
        io: &mut ProgramIo<'_>,
    ) -> Result<i32, RuntimeError>;
}

/// `"Main.java"` -> `"Main"`.
pub fn class_name_from_file(filename: &str) -> &str {
    filename.strip_suffix(".java").unwrap_or(filename)
}

/// Arguments to `javac` compiling `filenames` into `/files/`.
pub fn javac_args<'a, I>(filenames: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut args: Vec<String> = filenames.into_iter()
        .map(|f| format!("{}{}", SOURCE_DIR, f))
        .collect();
    args.extend(["-d", "/files/", "-Xlint"].iter().map(|s| s.to_string()));
    args
}

/**
Java source for the class that installs an `InputStream` backed by the
host's input channel as `System.in`, then calls `target_class.main()`.

Each `read()` asks the host for a line through two native methods the
runtime binds to the workspace's `StdinGuest`.
*/
pub fn input_adapter_source(target_class: &str) -> String {
    format!(r#"/*
CustomFileInputStream.java

Generated before every run; edits here are not kept. Installs an InputStream
that reads lines from the workspace input box as System.in, then runs the
main method of {target}.java.
*/

import java.io.*;

public class CustomFileInputStream extends InputStream {{
    private byte[] pending = new byte[0];
    private int offset = 0;

    public CustomFileInputStream() throws IOException {{
        super();
    }}

    @Override
    public int available() throws IOException {{
        return pending.length - offset;
    }}

    @Override
    public int read() throws IOException {{
        byte[] one = new byte[1];
        int n = read(one, 0, 1);
        return n < 0 ? -1 : (one[0] & 0xff);
    }}

    @Override
    public int read(byte[] b, int o, int l) throws IOException {{
        if (offset >= pending.length) {{
            String line = requestLine();
            if (line == null) {{
                return -1;
            }}
            pending = line.getBytes();
            offset = 0;
        }}
        int len = Math.min(l, pending.length - offset);
        System.arraycopy(pending, offset, b, o, len);
        offset += len;
        return len;
    }}

    @Override
    public int read(byte[] b) throws IOException {{
        return read(b, 0, b.length);
    }}

    // Bound by the host: blocks until a line is submitted, and returns
    // null once input is cancelled or times out.
    public static native String requestLine();

    public static void main(String[] args) {{
        try {{
            System.setIn(new CustomFileInputStream());
            {target}.main(new String[0]);
        }} catch (Exception e) {{
            e.printStackTrace();
        }}
    }}
}}
"#, target = target_class)
}
