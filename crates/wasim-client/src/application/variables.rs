//! Variable reads and writes, and calculator code execution.

use tracing::debug;
use wasim_core::protocol::messages::STRSZ_CMD;
use wasim_core::{CalcResultType, Command, VariableRequest};

use crate::application::error::ClientError;
use crate::application::session::Session;

/// Result of running calculator code.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalcResult {
    /// Numeric result; 0 for string results.
    pub value: f64,
    /// String or formatted result; empty for numeric results.
    pub text: String,
}

impl Session {
    /// Reads a variable and returns its numeric value.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] for a descriptor that cannot be
    /// encoded, plus the errors of [`send_command`](Self::send_command).
    pub async fn get_variable(&self, variable: &VariableRequest) -> Result<f64, ClientError> {
        let command = variable.get_command(0.0)?;
        let response = self.send_command(command, None).await?;
        Ok(response.value)
    }

    /// Reads a local (`L`) variable by name.
    pub async fn get_local_variable(&self, name: &str, unit: &str) -> Result<f64, ClientError> {
        self.get_variable(&VariableRequest::local(name).with_unit(unit)).await
    }

    /// Reads a local variable, creating it with `default` if it does not
    /// exist yet.
    pub async fn get_or_create_local_variable(
        &self,
        name: &str,
        default: f64,
        unit: &str,
    ) -> Result<f64, ClientError> {
        let variable = VariableRequest::local(name).with_unit(unit).creating();
        let command = variable.get_command(default)?;
        let response = self.send_command(command, None).await?;
        Ok(response.value)
    }

    /// Writes `value` to a variable and waits for the module to confirm.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] for read-only variable types, plus
    /// the errors of [`send_command`](Self::send_command).
    pub async fn set_variable(&self, variable: &VariableRequest, value: f64) -> Result<(), ClientError> {
        let command = variable.set_command(value)?;
        self.send_command(command, None).await?;
        Ok(())
    }

    /// Writes a local (`L`) variable by name.
    pub async fn set_local_variable(&self, name: &str, value: f64, unit: &str) -> Result<(), ClientError> {
        self.set_variable(&VariableRequest::local(name).with_unit(unit), value).await
    }

    /// Writes a local variable, creating it first if needed.
    pub async fn set_or_create_local_variable(
        &self,
        name: &str,
        value: f64,
        unit: &str,
    ) -> Result<(), ClientError> {
        self.set_variable(&VariableRequest::local(name).with_unit(unit).creating(), value)
            .await
    }

    /// Runs calculator code on the module.
    ///
    /// With [`CalcResultType::None`] the code is sent without waiting and an
    /// empty result is returned.  Otherwise the call waits for the result.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] for empty or oversized code, plus the
    /// errors of [`send_command`](Self::send_command).
    pub async fn execute_calculator_code(
        &self,
        code: &str,
        result_type: CalcResultType,
    ) -> Result<CalcResult, ClientError> {
        if code.is_empty() {
            return Err(ClientError::InvalidArgument("calculator code is empty".to_string()));
        }
        if code.len() >= STRSZ_CMD {
            return Err(ClientError::InvalidArgument(format!(
                "calculator code of {} bytes exceeds the {} byte limit",
                code.len(),
                STRSZ_CMD - 1
            )));
        }
        let command = Command::Exec {
            result_type,
            code: code.to_string(),
        };
        if result_type == CalcResultType::None {
            let token = self.send_command_async(command).await?;
            debug!("sent calculator code without result (token {token})");
            return Ok(CalcResult::default());
        }
        let response = self.send_command(command, None).await?;
        Ok(CalcResult {
            value: response.value,
            text: response.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::session::SessionSettings;
    use crate::application::transport::MockTransport;

    fn idle_session() -> Session {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        Session::new(SessionSettings::default(), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_read_only_type_fails_before_sending() {
        // Arrange
        let session = idle_session();
        let variable = VariableRequest::new('E', "SIMULATION TIME");

        // Act
        let result = session.set_variable(&variable, 1.0).await;

        // Assert
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_empty_name_fails_before_sending() {
        let session = idle_session();
        let result = session.get_local_variable("", "").await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_oversized_calculator_code_is_rejected() {
        let session = idle_session();
        let code = "1".repeat(STRSZ_CMD);
        let result = session.execute_calculator_code(&code, CalcResultType::Double).await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_valid_get_needs_a_connection() {
        let session = idle_session();
        let result = session
            .get_variable(&VariableRequest::sim_var("PLANE ALTITUDE", "feet", 0))
            .await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }
}
