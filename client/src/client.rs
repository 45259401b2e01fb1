//! The client state machine, modeled on the RFC 2131 state diagram.

use std::{fmt, mem, net::Ipv4Addr, time::Duration};

use eui48::MacAddress;
use rand::{rngs::StdRng, Rng, SeedableRng};

use dhcp_protocol::*;
use routing_core::{time_after, time_before, Datagram, Destination, Network, Scheduler, Time};

use crate::{
    backoff::Backoff,
    config::Config,
    env::{Environment, Reason, Script},
    error::Error,
    lease::{Lease, LeaseTimers},
    lease_file::LeaseDatabase,
    message_builder::MessageBuilder,
};

/// The IP TTL of client datagrams.
const DEFAULT_TTL: u8 = 16;

/// The largest message the client sends.
const SIZE_MESSAGE_MAXIMAL: usize = SIZE_MESSAGE_MINIMAL - SIZE_HEADER_IP - SIZE_HEADER_UDP;

/// The RFC 2131 client states.
///
/// INIT-REBOOT is folded into `Rebooting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Rebooting,
    Selecting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::State::*;
        match self {
            Init => write!(f, "INIT"),
            Rebooting => write!(f, "REBOOTING"),
            Selecting => write!(f, "SELECTING"),
            Requesting => write!(f, "REQUESTING"),
            Bound => write!(f, "BOUND"),
            Renewing => write!(f, "RENEWING"),
            Rebinding => write!(f, "REBINDING"),
            Stopped => write!(f, "STOPPED"),
        }
    }
}

/// The delayed work of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Retransmits the DHCPDISCOVER.
    SendDiscover,
    /// Retransmits the DHCPREQUEST.
    SendRequest,
    /// Ends the offer collection window.
    StateSelecting,
    /// T1 of the active lease.
    StateBound,
    /// Ends the sleep after every lease failed.
    StateInit,
}

impl routing_core::Task for Task {
    type Key = Task;

    fn key(&self) -> Task {
        *self
    }
}

/// One client binding on one interface.
pub struct Client<N, S, D> {
    config: Config,
    interface: String,
    hardware_address: MacAddress,
    builder: MessageBuilder,
    network: N,
    script: S,
    database: D,
    rng: StdRng,
    scheduler: Scheduler<Task>,

    state: State,
    xid: u32,
    /// The message (re)transmitted in the current state.
    packet: Option<Message>,
    destination: Destination,
    first_sending: Time,
    backoff: Backoff,

    active: Option<Lease>,
    new: Option<Lease>,
    offered: Vec<Lease>,
    /// Still valid leases the client held before, tried when nothing answers.
    recorded: Vec<Lease>,
    requested_address: Option<Ipv4Addr>,

    last_write: Option<Time>,
    leases_written: usize,
}

impl<N, S, D> Client<N, S, D>
where
    N: Network,
    S: Script,
    D: LeaseDatabase,
{
    pub fn new(
        interface: &str,
        hardware_address: MacAddress,
        config: Config,
        network: N,
        script: S,
        database: D,
    ) -> Self {
        let builder = MessageBuilder::new(
            hardware_address.to_owned(),
            config.client_id.to_owned(),
            config.hostname.to_owned(),
            config.requested_options.to_owned(),
            Some(SIZE_MESSAGE_MINIMAL as u16),
        );
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let backoff = Backoff::new(config.initial_interval, config.backoff_cutoff);

        Client {
            config,
            interface: interface.to_owned(),
            hardware_address,
            builder,
            network,
            script,
            database,
            rng,
            scheduler: Scheduler::new(),

            state: State::Init,
            xid: 0,
            packet: None,
            destination: Destination::Broadcast,
            first_sending: Time::ZERO,
            backoff,

            active: None,
            new: None,
            offered: Vec::new(),
            recorded: Vec::new(),
            requested_address: None,

            last_write: None,
            leases_written: 0,
        }
    }

    /// Loads the recorded leases and starts looking for a lease.
    ///
    /// The freshest recorded lease is requested again through INIT-REBOOT.
    pub fn start(&mut self, now: Time) -> Result<(), Error> {
        let mut leases: Vec<Lease> = Vec::new();
        for lease in self.database.load()? {
            leases.retain(|known| known.address != lease.address);
            leases.push(lease);
        }
        leases.retain(|lease| lease.is_static || lease.is_valid(now));
        info!("Loaded {} usable recorded leases", leases.len());

        self.active = leases.pop();
        self.recorded = leases;

        let mut environment = Environment::new(Reason::Preinit, &self.interface);
        environment.write_requested(&self.config.requested_options);
        self.script.run(&environment);

        self.state_reboot(now)
    }

    /// Feeds a datagram received on the client port.
    ///
    /// Replies for someone else, for another transaction or for another
    /// state are dropped.
    pub fn handle_message(&mut self, now: Time, bytes: &[u8]) -> Result<(), Error> {
        let message = match Message::from_bytes(bytes) {
            Ok(message) => message,
            Err(error) => {
                warn!("Discarding an undecodable message: {}", error);
                return Ok(());
            }
        };

        if message.operation_code != OperationCode::BootReply {
            debug!("Discarding a {} message", message.operation_code);
            return Ok(());
        }
        check_xid!(self.xid, message.transaction_id);
        check_hardware_address!(self.hardware_address, message.client_hardware_address);

        if message.is_bootp() {
            log_receive!(message, "BOOTREPLY");
            return self.dhcpoffer(now, message);
        }

        let dhcp_message_type = validate!(message);
        log_receive!(message, dhcp_message_type);
        match dhcp_message_type {
            MessageType::DhcpOffer => self.dhcpoffer(now, message),
            MessageType::DhcpAck => self.dhcpack(now, message),
            MessageType::DhcpNak => self.dhcpnak(now),
            other => {
                warn!("Unexpected {} from a server", other);
                Ok(())
            }
        }
    }

    /// Fires every task due at `now`.
    pub fn handle_timers(&mut self, now: Time) -> Result<(), Error> {
        while let Some((ticket, task)) = self.scheduler.pop_due(now) {
            trace!("Timer {} fired: {:?} in {}", ticket, task, self.state);
            match task {
                Task::SendDiscover => self.send_discover(now)?,
                Task::SendRequest => self.send_request(now)?,
                Task::StateSelecting => self.state_selecting(now)?,
                Task::StateBound => self.state_bound(now)?,
                Task::StateInit => self.state_init(now)?,
            }
        }
        Ok(())
    }

    /// When `handle_timers` has something to do next.
    pub fn next_deadline(&mut self) -> Option<Time> {
        self.scheduler.next_deadline()
    }

    /// Gives the active lease back to its server and stops.
    pub fn release(&mut self, now: Time) -> Result<(), Error> {
        self.cancel_all();
        self.state = State::Stopped;

        let active = match self.active.take() {
            Some(active) => active,
            None => {
                info!("Nothing to release on {}", self.interface);
                return Ok(());
            }
        };

        match active.server_id() {
            Some(server) => {
                self.xid = self.rng.gen();
                let mut message = self.builder.release(self.xid, active.address, server, None);
                message.seconds = 0;
                self.send(&message, Destination::Unicast(server))?;
            }
            None => warn!("The lease for {} names no server, not sending DHCPRELEASE", active.address),
        }

        let mut environment = Environment::new(Reason::Release, &self.interface);
        environment.write_params("old_", &active);
        self.script.run(&environment);

        self.last_write = Some(now);
        self.database.rewrite(&self.recorded)?;
        info!("Released {}", active.address);
        Ok(())
    }

    /// Stops without releasing the active lease.
    pub fn stop(&mut self) {
        self.cancel_all();
        self.state = State::Stopped;

        let mut environment = Environment::new(Reason::Stop, &self.interface);
        if let Some(ref active) = self.active {
            environment.write_params("old_", active);
        }
        self.script.run(&environment);
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn active_lease(&self) -> Option<&Lease> {
        self.active.as_ref()
    }

    pub fn offered_leases(&self) -> &[Lease] {
        &self.offered
    }

    pub fn recorded_leases(&self) -> &[Lease] {
        &self.recorded
    }

    /// The current retransmission interval in seconds.
    pub fn interval(&self) -> u64 {
        self.backoff.interval()
    }

    /// Whether a task of this kind is waiting to fire.
    pub fn is_scheduled(&self, task: Task) -> bool {
        self.scheduler.find_outstanding(&task).is_some()
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn script(&self) -> &S {
        &self.script
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    /// INIT-REBOOT with the active lease, or INIT without one.
    fn state_reboot(&mut self, now: Time) -> Result<(), Error> {
        let address = match self.active {
            Some(ref lease) if !lease.is_bootp && lease.is_valid(now) => lease.address,
            _ => return self.state_init(now),
        };

        self.cancel_all();
        self.xid = self.rng.gen();
        self.packet = Some(self.builder.request_init_reboot(self.xid, false, address));
        self.destination = Destination::Broadcast;
        self.set_state(State::Rebooting);
        self.first_sending = now;
        self.backoff.reset();
        self.send_request(now)
    }

    /// Starts a new DHCPDISCOVER cycle.
    fn state_init(&mut self, now: Time) -> Result<(), Error> {
        self.cancel_all();
        self.offered.clear();
        self.requested_address = self.active.as_ref().map(|lease| lease.address);
        self.xid = self.rng.gen();
        self.packet = Some(self.builder.discover(self.xid, false, self.requested_address));
        self.destination = Destination::Broadcast;
        self.set_state(State::Selecting);
        self.first_sending = now;
        self.backoff.reset();
        self.send_discover(now)
    }

    /// Picks one of the collected offers.
    fn state_selecting(&mut self, now: Time) -> Result<(), Error> {
        if self.state != State::Selecting {
            return Ok(());
        }
        self.scheduler.cancel_key(&Task::SendDiscover);
        self.scheduler.cancel_key(&Task::StateSelecting);

        let mut offered = mem::replace(&mut self.offered, Vec::new());
        if offered.is_empty() {
            return self.state_init(now);
        }
        let mut picked = offered.remove(0);
        for lease in offered {
            debug!("Discarding the offer of {}", lease.address);
        }

        if picked.is_bootp {
            picked.apply(now, LeaseTimers::bootp());
            self.new = Some(picked);
            self.set_state(State::Requesting);
            return self.bind_lease(now);
        }

        let server = match picked.server_id() {
            Some(server) => server,
            None => {
                warn!("The offer of {} names no server", picked.address);
                return self.state_init(now);
            }
        };

        self.xid = self.rng.gen();
        self.packet = Some(self.builder.request_selecting(self.xid, false, picked.address, server));
        self.destination = Destination::Broadcast;
        self.set_state(State::Requesting);
        self.first_sending = now;
        self.backoff.reset();
        self.send_request(now)
    }

    fn dhcpoffer(&mut self, now: Time, message: Message) -> Result<(), Error> {
        if self.state != State::Selecting {
            debug!("Not collecting offers in {}", self.state);
            return Ok(());
        }
        if self.offered.iter().any(|lease| lease.address == message.your_ip_address) {
            debug!("The offer of {} is already seen", message.your_ip_address);
            return Ok(());
        }

        let lease = Lease::from_message(&message);
        if Some(lease.address) == self.requested_address {
            self.offered.insert(0, lease);
        } else {
            self.offered.push(lease);
        }

        let stop_selecting = self.first_sending + self.config.select_interval;
        if !time_before(now, stop_selecting) {
            return self.state_selecting(now);
        }
        if !self.is_scheduled(Task::StateSelecting) {
            self.scheduler.schedule_at(stop_selecting, Task::StateSelecting);
        }
        self.scheduler.cancel_key(&Task::SendDiscover);
        Ok(())
    }

    fn dhcpack(&mut self, now: Time, message: Message) -> Result<(), Error> {
        match self.state {
            State::Rebooting | State::Requesting | State::Renewing | State::Rebinding => {}
            _ => {
                debug!("Not expecting DHCPACK in {}", self.state);
                return Ok(());
            }
        }

        let mut lease = Lease::from_message(&message);
        self.scheduler.cancel_key(&Task::SendRequest);

        let timers = LeaseTimers::compute(&lease.options, &mut self.rng);
        lease.apply(now, timers);
        self.new = Some(lease);
        self.bind_lease(now)
    }

    fn dhcpnak(&mut self, now: Time) -> Result<(), Error> {
        match self.state {
            State::Rebooting | State::Requesting | State::Renewing | State::Rebinding => {}
            _ => {
                debug!("Not expecting DHCPNAK in {}", self.state);
                return Ok(());
            }
        }

        if let Some(active) = self.active.take() {
            info!("Dropping the lease for {}", active.address);
        }
        self.scheduler.cancel_key(&Task::SendRequest);
        self.set_state(State::Init);
        self.state_init(now)
    }

    /// Applies the new lease and waits for T1.
    fn bind_lease(&mut self, now: Time) -> Result<(), Error> {
        let new = match self.new.take() {
            Some(new) => new,
            None => return Ok(()),
        };

        let reason = match self.state {
            State::Requesting => Reason::Bound,
            State::Renewing => Reason::Renew,
            State::Rebooting => Reason::Reboot,
            _ => Reason::Rebind,
        };
        let mut environment = Environment::new(reason, &self.interface);
        if let Some(ref active) = self.active {
            if self.state != State::Rebooting {
                environment.write_params("old_", active);
            }
        }
        environment.write_params("new_", &new);
        environment.write_requested(&self.config.requested_options);

        // a failing script has found the address in use
        if self.script.run(&environment) != 0 {
            warn!("The configuration script refused {}", new.address);
            self.send_decline(&new)?;
            if self.config.one_try {
                info!("Unable to obtain a lease on first try (declined)");
                return Err(Error::NoLeaseOnFirstTry);
            }
            return self.state_init(now);
        }

        let is_due = match self.last_write {
            Some(last) => now.as_secs().saturating_sub(last.as_secs()) >= self.config.min_lease_write.as_secs(),
            None => true,
        };
        if is_due {
            self.write_lease(now, &new);
        }

        let renewal = new.renewal;
        info!(
            "Bound to {} on {} -- renewal in {} seconds",
            new.address,
            self.interface,
            now.until(renewal).as_secs(),
        );
        self.active = Some(new);
        self.scheduler.cancel_key(&Task::StateBound);
        self.scheduler.schedule_at(renewal, Task::StateBound);
        self.set_state(State::Bound);
        Ok(())
    }

    /// T1 has passed, asks the leasing server to extend the lease.
    fn state_bound(&mut self, now: Time) -> Result<(), Error> {
        if self.state != State::Bound {
            return Ok(());
        }
        let (address, server) = match self.active {
            Some(ref active) => (active.address, active.server_id()),
            None => return self.state_init(now),
        };

        self.xid = self.rng.gen();
        self.packet = Some(self.builder.request_renew(self.xid, false, address));
        self.destination = match server {
            Some(server) => Destination::Unicast(server),
            None => Destination::Broadcast,
        };
        self.first_sending = now;
        self.backoff.reset();
        self.set_state(State::Renewing);
        self.send_request(now)
    }

    fn send_discover(&mut self, now: Time) -> Result<(), Error> {
        if self.state != State::Selecting {
            return Ok(());
        }

        let elapsed = now.as_secs().saturating_sub(self.first_sending.as_secs());
        let timeout = self.config.timeout.as_secs();
        if elapsed > timeout {
            return self.state_panic(now);
        }

        self.backoff.next(&mut self.rng);
        let interval = self.backoff.clamp(timeout - elapsed);

        let mut message = match self.packet.take() {
            Some(message) => message,
            None => return Ok(()),
        };
        message.seconds = elapsed.min(u64::from(u16::max_value())) as u16;
        info!("DHCPDISCOVER on {} interval {}", self.interface, interval);
        let result = self.send(&message, Destination::Broadcast);
        self.packet = Some(message);
        result?;

        self.scheduler.schedule(now, Duration::from_secs(interval), Task::SendDiscover);
        Ok(())
    }

    fn send_request(&mut self, now: Time) -> Result<(), Error> {
        match self.state {
            State::Rebooting | State::Requesting | State::Renewing | State::Rebinding => {}
            _ => return Ok(()),
        }

        let elapsed = now.as_secs().saturating_sub(self.first_sending.as_secs());
        let reboot_timeout = self.config.reboot_timeout.as_secs();

        // no server answers, so look for another one
        if (self.state == State::Rebooting || self.state == State::Requesting) && elapsed > reboot_timeout {
            self.set_state(State::Init);
            self.scheduler.cancel_key(&Task::SendRequest);
            return self.state_init(now);
        }

        let (expiry, rebind) = match self.active {
            Some(ref active) => (active.expiry, active.rebind),
            None if self.state == State::Requesting => (Time::ZERO, Time::ZERO),
            None => return self.state_init(now),
        };

        if self.state != State::Requesting && time_after(now, expiry) {
            self.expire(now);
            return self.state_init(now);
        }

        self.backoff.next(&mut self.rng);
        let now_secs = now.as_secs();
        let interval = match self.state {
            State::Requesting => self.backoff.clamp(reboot_timeout - elapsed),
            State::Rebooting => {
                let remaining = (reboot_timeout - elapsed).min(expiry.as_secs().saturating_sub(now_secs));
                self.backoff.clamp(remaining)
            }
            _ => self.backoff.clamp(expiry.as_secs().saturating_sub(now_secs)),
        };

        if self.state == State::Renewing && time_after(now, rebind) {
            self.set_state(State::Rebinding);
        }

        let destination = match self.state {
            State::Renewing => self.destination,
            _ => Destination::Broadcast,
        };

        let mut message = match self.packet.take() {
            Some(message) => message,
            None => return Ok(()),
        };
        message.seconds = elapsed.min(u64::from(u16::max_value())) as u16;
        info!("DHCPREQUEST on {} to {} interval {}", self.interface, destination, interval);
        let result = self.send(&message, destination);
        self.packet = Some(message);
        result?;

        self.scheduler.schedule(now, Duration::from_secs(interval), Task::SendRequest);
        Ok(())
    }

    /// The active lease ran out without being extended.
    fn expire(&mut self, now: Time) {
        if let Some(ref active) = self.active {
            info!("The lease for {} expired at {}", active.address, active.expiry);
            let mut environment = Environment::new(Reason::Expire, &self.interface);
            environment.write_params("old_", active);
            environment.write_requested(&self.config.requested_options);
            self.script.run(&environment);
        }

        let environment = Environment::new(Reason::Preinit, &self.interface);
        self.script.run(&environment);
        trace!("Expired at {}", now);
        self.set_state(State::Init);
    }

    /// Nothing answered within the timeout, falls back to recorded leases.
    fn state_panic(&mut self, now: Time) -> Result<(), Error> {
        info!("No DHCPOFFERS received on {}", self.interface);
        self.cancel_all();

        let mut candidates: Vec<Lease> = self.active.take().into_iter().collect();
        candidates.extend(self.recorded.drain(..));

        let mut tried = Vec::new();
        while !candidates.is_empty() {
            let lease = candidates.remove(0);
            if !lease.is_valid(now) {
                tried.push(lease);
                continue;
            }

            info!("Trying recorded lease {}", lease.address);
            let mut environment = Environment::new(Reason::Timeout, &self.interface);
            environment.write_params("new_", &lease);
            environment.write_requested(&self.config.requested_options);
            if self.script.run(&environment) != 0 {
                tried.push(lease);
                continue;
            }

            let renewal = lease.renewal;
            self.active = Some(lease);
            candidates.extend(tried);
            self.recorded = candidates;
            self.set_state(State::Bound);
            if time_before(now, renewal) {
                info!("Bound: renewal in {} seconds", now.until(renewal).as_secs());
                self.scheduler.schedule_at(renewal, Task::StateBound);
                return Ok(());
            }
            info!("Bound: immediate renewal");
            return self.state_bound(now);
        }
        self.recorded = tried;

        if self.config.one_try {
            info!("Unable to obtain a lease on first try");
            return Err(Error::NoLeaseOnFirstTry);
        }

        info!("No working leases in persistent database - sleeping");
        let environment = Environment::new(Reason::Fail, &self.interface);
        self.script.run(&environment);
        self.set_state(State::Init);

        let retry = self.config.retry_interval.as_secs().max(1);
        let sleep = (retry + 1) / 2 + self.rng.gen_range(0..retry);
        self.scheduler.schedule(now, Duration::from_secs(sleep), Task::StateInit);
        Ok(())
    }

    fn send_decline(&mut self, lease: &Lease) -> Result<(), Error> {
        let server = match lease.server_id() {
            Some(server) => server,
            // BOOTP has nobody to decline to
            None => return Ok(()),
        };
        let message = self.builder.decline(self.xid, lease.address, server, None);
        self.send(&message, Destination::Broadcast)
    }

    /// Records a bound lease, compacting the database now and then.
    fn write_lease(&mut self, now: Time, lease: &Lease) {
        self.last_write = Some(now);
        if lease.is_static {
            return;
        }

        self.leases_written += 1;
        let result = if self.leases_written > self.config.lease_rewrite_threshold {
            self.leases_written = 0;
            let mut leases = self.recorded.clone();
            leases.push(lease.clone());
            self.database.rewrite(&leases)
        } else {
            self.database.append(lease)
        };
        if let Err(error) = result {
            warn!("Unable to record the lease for {}: {}", lease.address, error);
        }
    }

    fn send(&mut self, message: &Message, destination: Destination) -> Result<(), Error> {
        message.validate()?;
        let mut payload = vec![0u8; SIZE_MESSAGE_MAXIMAL];
        let length = message.to_bytes(&mut payload).map_err(Error::Protocol)?;
        payload.truncate(length);

        log_send!(message, destination);
        self.network.send(Datagram {
            destination,
            ttl: DEFAULT_TTL,
            payload,
        });
        Ok(())
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            info!("{}: {} -> {}", self.interface, self.state, state);
            self.state = state;
        }
    }

    fn cancel_all(&mut self) {
        for task in &[
            Task::SendDiscover,
            Task::SendRequest,
            Task::StateSelecting,
            Task::StateBound,
            Task::StateInit,
        ] {
            self.scheduler.cancel_key(task);
        }
    }
}
