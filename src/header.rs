use crate::error::Error;
use crate::template;
use crate::timestamp::Timestamp;

/// Username and password carried in clear text inside the security header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Values for one rendering of the `wsse:Security` header.
#[derive(Debug)]
pub struct SecurityHeader<'a> {
    pub certificate_body: &'a str,
    pub token_id: &'a str,
    pub timestamp_id: &'a str,
    pub timestamp: &'a Timestamp,
    pub credentials: Option<&'a Credentials>,
    /// Prefix bound to the SOAP envelope namespace, used for `mustUnderstand`.
    pub envelope_prefix: Option<&'a str>,
}

impl SecurityHeader<'_> {
    pub fn render(&self) -> Result<String, Error> {
        let username_token = match self.credentials {
            Some(c) => {
                let username = template::escape(&c.username);
                let password = template::escape(&c.password);
                template::render(
                    template::USERNAME_TOKEN,
                    &[("username", username.as_str()), ("password", password.as_str())],
                )?
            }
            None => String::new(),
        };
        let must_understand = match self.envelope_prefix {
            Some(p) => format!(" {}:mustUnderstand=\"1\"", p),
            None => String::new(),
        };

        template::render(
            template::SECURITY_HEADER,
            &[
                ("must_understand", must_understand.as_str()),
                ("token_id", self.token_id),
                ("binary_token", self.certificate_body),
                ("username_token", username_token.as_str()),
                ("timestamp_id", self.timestamp_id),
                ("created", self.timestamp.created.as_str()),
                ("expires", self.timestamp.expires.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp() -> Timestamp {
        Timestamp {
            created: "2021-01-01T00:00:00Z".to_string(),
            expires: "2021-01-01T00:10:00Z".to_string(),
        }
    }

    fn parses(fragment: &str) {
        let wrapped = format!("<soap:Header xmlns:soap=\"urn:s\">{}</soap:Header>", fragment);
        crate::parse_events(&wrapped).unwrap();
    }

    #[test]
    fn header_without_credentials() {
        let ts = timestamp();
        let out = SecurityHeader {
            certificate_body: "MIIBcert",
            token_id: "x509-1234",
            timestamp_id: "TS-1",
            timestamp: &ts,
            credentials: None,
            envelope_prefix: Some("soap"),
        }
        .render()
        .unwrap();

        assert!(out.contains("soap:mustUnderstand=\"1\""));
        assert!(out.contains("wsu:Id=\"x509-1234\">MIIBcert</wsse:BinarySecurityToken>"));
        assert!(out.contains("<wsu:Created>2021-01-01T00:00:00Z</wsu:Created>"));
        assert!(out.contains("<wsu:Expires>2021-01-01T00:10:00Z</wsu:Expires>"));
        assert!(!out.contains("UsernameToken"));
        parses(&out);
    }

    #[test]
    fn header_with_escaped_credentials() {
        let ts = timestamp();
        let creds = Credentials {
            username: "bob".to_string(),
            password: "p<&>ss".to_string(),
        };
        let out = SecurityHeader {
            certificate_body: "MIIBcert",
            token_id: "x509-1234",
            timestamp_id: "TS-1",
            timestamp: &ts,
            credentials: Some(&creds),
            envelope_prefix: Some("soap"),
        }
        .render()
        .unwrap();

        assert!(out.contains("<wsse:Username>bob</wsse:Username>"));
        assert!(out.contains("#PasswordText\">p&lt;&amp;&gt;ss</wsse:Password>"));
        parses(&out);
    }

    #[test]
    fn unprefixed_envelope_omits_must_understand() {
        let ts = timestamp();
        let out = SecurityHeader {
            certificate_body: "MIIBcert",
            token_id: "x509-1234",
            timestamp_id: "TS-1",
            timestamp: &ts,
            credentials: None,
            envelope_prefix: None,
        }
        .render()
        .unwrap();
        assert!(!out.contains("mustUnderstand"));
    }
}
