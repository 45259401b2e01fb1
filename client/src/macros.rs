//! Macro functions used in the `Client::handle_message` method.

/// Just to move some code from the overwhelmed `handle_message` method.
macro_rules! log_send(
    ($message:expr, $destination:expr) => (
        match $message.options.dhcp_message_type() {
            Some(message_type) => info!("Sending {} to {}", message_type, $destination),
            None => info!("Sending BOOTREQUEST to {}", $destination),
        }
        debug!("{}", $message);
    );
);

/// Just to move some code from the overwhelmed `handle_message` method.
macro_rules! log_receive(
    ($message:expr, $message_type:expr) => (
        info!("Received {} from {}", $message_type, $message.server_ip_address);
        debug!("{}", $message);
    );
);

/// Just to move some code from the overwhelmed `handle_message` method.
macro_rules! validate (
    ($message:expr) => (
        match $message.validate() {
            Ok(dhcp_message_type) => dhcp_message_type,
            Err(error) => {
                warn!("The response from {} is invalid: {} {}", $message.server_ip_address, error, $message);
                return Ok(());
            },
        }
    );
);

/// Just to move some code from the overwhelmed `handle_message` method.
macro_rules! check_xid (
    ($yours:expr, $response:expr) => (
        if $response != $yours {
            warn!("Got a response with wrong transaction ID: {:#010x} (yours is {:#010x})", $response, $yours);
            return Ok(());
        }
    );
);

/// Just to move some code from the overwhelmed `handle_message` method.
macro_rules! check_hardware_address (
    ($yours:expr, $response:expr) => (
        if $response != $yours {
            warn!("Got a response for another hardware address: {} (yours is {})", $response, $yours);
            return Ok(());
        }
    );
);
