//! Commands understood by the ESP-AT firmware.
//!
//! Only the commands the driver issues are modelled; anything else can be
//! sent through [`AtCommand::Raw`].

/// A command line for the ESP-AT firmware.
#[derive(Debug, Clone, PartialEq)]
pub enum AtCommand {
    /// Restore factory settings and reboot (`AT+RESTORE`).
    Restore,
    /// Disable command echo (`ATE0`).
    EchoOff,
    /// Query connection status (`AT+CIPSTATUS`).
    Status,
    /// Switch to station mode (`AT+CWMODE=1`).
    SetStationMode,
    /// Join an access point (`AT+CWJAP="<ssid>","<password>"`).
    JoinAccessPoint {
        /// Network name.
        ssid: String,
        /// Network password.
        password: String,
    },
    /// Enable SNTP with a timezone and server (`AT+CIPSNTPCFG=1,<tz>,"<server>"`).
    ConfigureSntp {
        /// UTC offset in hours.
        timezone: i8,
        /// NTP server host name.
        server: String,
    },
    /// Read the SNTP time (`AT+CIPSNTPTIME?`).
    QuerySntpTime,
    /// Open a TCP connection (`AT+CIPSTART="TCP","<host>",<port>`).
    StartTcp {
        /// Remote host or IP.
        host: String,
        /// Remote port.
        port: u16,
    },
    /// Announce `len` bytes of payload (`AT+CIPSEND=<len>`).
    Send {
        /// Payload length in bytes.
        len: usize,
    },
    /// Any other command, sent verbatim.
    Raw(String),
}

impl AtCommand {
    /// Encode the command line, without its CRLF.
    pub fn encode(&self) -> String {
        match self {
            AtCommand::Restore => "AT+RESTORE".to_string(),
            AtCommand::EchoOff => "ATE0".to_string(),
            AtCommand::Status => "AT+CIPSTATUS".to_string(),
            AtCommand::SetStationMode => "AT+CWMODE=1".to_string(),
            AtCommand::JoinAccessPoint { ssid, password } => {
                format!("AT+CWJAP=\"{}\",\"{}\"", ssid, password)
            }
            AtCommand::ConfigureSntp { timezone, server } => {
                format!("AT+CIPSNTPCFG=1,{},\"{}\"", timezone, server)
            }
            AtCommand::QuerySntpTime => "AT+CIPSNTPTIME?".to_string(),
            AtCommand::StartTcp { host, port } => {
                format!("AT+CIPSTART=\"TCP\",\"{}\",{}", host, port)
            }
            AtCommand::Send { len } => format!("AT+CIPSEND={}", len),
            AtCommand::Raw(line) => line.clone(),
        }
    }

    /// Encode the command line, including its CRLF.
    pub fn encode_line(&self) -> Vec<u8> {
        crate::codec::encode_command(&self.encode())
    }
}

impl std::fmt::Display for AtCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(AtCommand::Restore.encode(), "AT+RESTORE");
        assert_eq!(AtCommand::EchoOff.encode(), "ATE0");
        assert_eq!(AtCommand::Status.encode(), "AT+CIPSTATUS");
        assert_eq!(AtCommand::SetStationMode.encode(), "AT+CWMODE=1");
        assert_eq!(AtCommand::QuerySntpTime.encode(), "AT+CIPSNTPTIME?");
    }

    #[test]
    fn test_join_access_point() {
        let cmd = AtCommand::JoinAccessPoint {
            ssid: "home".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.encode(), r#"AT+CWJAP="home","secret""#);
    }

    #[test]
    fn test_configure_sntp_negative_timezone() {
        let cmd = AtCommand::ConfigureSntp {
            timezone: -5,
            server: "0.europe.pool.ntp.org".to_string(),
        };
        assert_eq!(cmd.encode(), r#"AT+CIPSNTPCFG=1,-5,"0.europe.pool.ntp.org""#);
    }

    #[test]
    fn test_start_tcp_and_send() {
        let cmd = AtCommand::StartTcp {
            host: "api.thingspeak.com".to_string(),
            port: 80,
        };
        assert_eq!(cmd.encode(), r#"AT+CIPSTART="TCP","api.thingspeak.com",80"#);
        assert_eq!(AtCommand::Send { len: 42 }.encode(), "AT+CIPSEND=42");
    }

    #[test]
    fn test_encode_line_and_display() {
        assert_eq!(AtCommand::Raw("AT+GMR".to_string()).encode_line(), b"AT+GMR\r\n");
        assert_eq!(AtCommand::EchoOff.to_string(), "ATE0");
    }
}
