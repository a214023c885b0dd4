//! One APRS-IS connection: dial, greeting, login, verification and (optionally)
//! a single report line. Sessions are never reused.

use std::{fmt, future::Future, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitGreeting,
    LoggingIn,
    AwaitVerification,
    Sending,
    Closed,
}

/// How the login reply is checked for `verified`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// report transmission
    CaseSensitive,
    /// health checks
    CaseInsensitive,
}

impl Verification {
    fn accepts(self, reply: &str) -> bool {
        let reply = match self {
            Verification::CaseSensitive => reply.to_string(),
            Verification::CaseInsensitive => reply.to_ascii_lowercase(),
        };
        reply.contains("verified")
    }
}

/// `user <CALLSIGN> pass <PASSCODE> vers <SOFTWARE>-<VERSION>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub callsign: String,
    pub passcode: u16,
    pub software: String,
    pub version: String,
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} pass {} vers {}-{}\r\n",
            self.callsign, self.passcode, self.software, self.version
        )
    }
}

pub struct Session {
    state: SessionState,
    stream: Option<BufReader<TcpStream>>,
    deadline: Duration,
}

impl Session {
    pub fn new(deadline: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            stream: None,
            deadline,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Idle -> Connecting -> AwaitGreeting
    pub async fn connect(&mut self, server: &str) -> Result<(), Error> {
        self.expect(SessionState::Idle)?;
        self.state = SessionState::Connecting;
        let stream = self
            .bounded("dialing server", TcpStream::connect(server))
            .await?;
        self.stream = Some(BufReader::new(stream));
        self.state = SessionState::AwaitGreeting;
        Ok(())
    }

    /// AwaitGreeting -> LoggingIn. the greeting must start with `#`
    pub async fn read_greeting(&mut self) -> Result<String, Error> {
        self.expect(SessionState::AwaitGreeting)?;
        let greeting = self.read_line("reading greeting").await?;
        if !greeting.starts_with('#') {
            return self.abort(format!("bad greeting: {:?}", greeting.trim_end()));
        }
        self.state = SessionState::LoggingIn;
        Ok(greeting)
    }

    /// LoggingIn -> AwaitVerification
    pub async fn login(&mut self, login: &Login) -> Result<(), Error> {
        self.expect(SessionState::LoggingIn)?;
        self.write_all("sending login", login.to_string().as_bytes())
            .await?;
        self.state = SessionState::AwaitVerification;
        Ok(())
    }

    /// AwaitVerification -> Sending. the reply must start with `#` and say `verified`
    pub async fn await_verification(&mut self, mode: Verification) -> Result<String, Error> {
        self.expect(SessionState::AwaitVerification)?;
        let reply = self.read_line("reading login reply").await?;
        if !reply.starts_with('#') {
            return self.abort(format!("bad login reply: {:?}", reply.trim_end()));
        }
        if !mode.accepts(&reply) {
            return self.abort(format!("login not verified: {:?}", reply.trim_end()));
        }
        self.state = SessionState::Sending;
        Ok(reply)
    }

    /// Sending -> Closed. the server's reaction is not read
    pub async fn send_line(&mut self, line: &str) -> Result<(), Error> {
        self.expect(SessionState::Sending)?;
        let mut packet = String::with_capacity(line.len() + 2);
        packet.push_str(line);
        packet.push_str("\r\n");
        self.write_all("sending report", packet.as_bytes()).await?;
        self.close().await;
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = timeout(self.deadline, stream.get_mut().shutdown()).await;
        }
        self.state = SessionState::Closed;
    }

    async fn read_line(&mut self, context: &'static str) -> Result<String, Error> {
        let deadline = self.deadline;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::ProtocolViolation(format!("{context}: not connected")));
        };
        let mut line = String::new();
        let read = timeout(deadline, stream.read_line(&mut line)).await;
        match read {
            Ok(Ok(0)) => self.fail(Error::connection(
                context,
                std::io::ErrorKind::UnexpectedEof.into(),
            )),
            Ok(Ok(_)) => Ok(line),
            Ok(Err(e)) => self.fail(Error::connection(context, e)),
            Err(_) => self.fail(Error::timed_out(context)),
        }
    }

    async fn write_all(&mut self, context: &'static str, buf: &[u8]) -> Result<(), Error> {
        let deadline = self.deadline;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::ProtocolViolation(format!("{context}: not connected")));
        };
        let write = async {
            let stream = stream.get_mut();
            stream.write_all(buf).await?;
            stream.flush().await
        };
        let written = timeout(deadline, write).await;
        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => self.fail(Error::connection(context, e)),
            Err(_) => self.fail(Error::timed_out(context)),
        }
    }

    async fn bounded<T>(
        &mut self,
        context: &'static str,
        fut: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T, Error> {
        let result = timeout(self.deadline, fut).await;
        match result {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => self.fail(Error::connection(context, e)),
            Err(_) => self.fail(Error::timed_out(context)),
        }
    }

    fn expect(&self, state: SessionState) -> Result<(), Error> {
        if self.state != state {
            return Err(Error::ProtocolViolation(format!(
                "session is {:?}, expected {state:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn abort<T>(&mut self, why: String) -> Result<T, Error> {
        self.fail(Error::ProtocolViolation(why))
    }

    /// drop the connection and move to Closed
    fn fail<T>(&mut self, error: Error) -> Result<T, Error> {
        self.stream = None;
        self.state = SessionState::Closed;
        Err(error)
    }
}

/// Dial `server` and run the handshake through verification.
/// On error the connection has already been dropped.
pub async fn handshake(
    server: &str,
    login: &Login,
    deadline: Duration,
    mode: Verification,
) -> Result<Session, Error> {
    let mut session = Session::new(deadline);
    session.connect(server).await?;
    session.read_greeting().await?;
    session.login(login).await?;
    session.await_verification(mode).await?;
    Ok(session)
}
